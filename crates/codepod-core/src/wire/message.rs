//! Wire message model.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Protocol version stamped on outbound headers.
pub const PROTOCOL_VERSION: &str = "5.0";

/// Username stamped on outbound headers.
const USERNAME: &str = "codepod";

/// Message header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Unique id of this message; echoed as `parent_header.msg_id` by replies.
    pub msg_id: String,
    /// Message type, e.g. `execute_request`.
    pub msg_type: String,
    /// Client session id.
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub username: String,
    /// ISO 8601 timestamp.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub version: String,
}

impl Header {
    /// Create a header for a new outbound message.
    pub fn new(msg_type: impl Into<String>, msg_id: impl Into<String>) -> Self {
        Self {
            msg_id: msg_id.into(),
            msg_type: msg_type.into(),
            session: String::new(),
            username: USERNAME.to_string(),
            date: chrono::Utc::now().to_rfc3339(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Message types the runtime understands.
///
/// Anything else is carried as [`MessageType::Other`] and ends up in the
/// router's log-and-drop arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Status,
    ExecuteInput,
    ExecuteResult,
    DisplayData,
    Stream,
    /// Non-standard stdout message emitted by some kernels.
    Stdout,
    Error,
    ExecuteRequest,
    ExecuteReply,
    KernelInfoRequest,
    KernelInfoReply,
    InterruptRequest,
    InterruptReply,
    Other(String),
}

impl MessageType {
    /// Parse a `msg_type` header value.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "status" => Self::Status,
            "execute_input" => Self::ExecuteInput,
            "execute_result" => Self::ExecuteResult,
            "display_data" => Self::DisplayData,
            "stream" => Self::Stream,
            "stdout" => Self::Stdout,
            "error" => Self::Error,
            "execute_request" => Self::ExecuteRequest,
            "execute_reply" => Self::ExecuteReply,
            "kernel_info_request" => Self::KernelInfoRequest,
            "kernel_info_reply" => Self::KernelInfoReply,
            "interrupt_request" => Self::InterruptRequest,
            "interrupt_reply" => Self::InterruptReply,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `msg_type` string for this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::ExecuteInput => "execute_input",
            Self::ExecuteResult => "execute_result",
            Self::DisplayData => "display_data",
            Self::Stream => "stream",
            Self::Stdout => "stdout",
            Self::Error => "error",
            Self::ExecuteRequest => "execute_request",
            Self::ExecuteReply => "execute_reply",
            Self::KernelInfoRequest => "kernel_info_request",
            Self::KernelInfoReply => "kernel_info_reply",
            Self::InterruptRequest => "interrupt_request",
            Self::InterruptReply => "interrupt_reply",
            Self::Other(raw) => raw,
        }
    }
}

/// A decoded (or to-be-encoded) multipart message.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    /// Routing envelope frames preceding the delimiter. Not interpreted.
    pub identities: Vec<Bytes>,
    pub header: Header,
    pub parent_header: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub content: Value,
    /// Raw trailing buffers.
    pub buffers: Vec<Bytes>,
}

impl WireMessage {
    /// Create a message with a fresh random `msg_id`.
    pub fn new(msg_type: impl Into<String>, content: Value) -> Self {
        Self::with_id(msg_type, Uuid::new_v4().to_string(), content)
    }

    /// Create a message with an explicit `msg_id`.
    ///
    /// Execute requests use the correlation id as their `msg_id`, so the
    /// engine echoes it back on every event the request causes.
    pub fn with_id(msg_type: impl Into<String>, msg_id: impl Into<String>, content: Value) -> Self {
        Self {
            identities: Vec::new(),
            header: Header::new(msg_type, msg_id),
            parent_header: Map::new(),
            metadata: Map::new(),
            content,
            buffers: Vec::new(),
        }
    }

    /// Build an `execute_request` for `code`, tagged with `msg_id`.
    pub fn execute_request(code: &str, msg_id: &str, store_history: bool) -> Self {
        Self::with_id(
            MessageType::ExecuteRequest.as_str(),
            msg_id,
            json!({
                "code": code,
                "silent": false,
                "store_history": store_history,
                "user_expressions": {},
                "allow_stdin": false,
                "stop_on_error": false,
            }),
        )
    }

    /// Build a `kernel_info_request`.
    pub fn kernel_info_request() -> Self {
        Self::new(MessageType::KernelInfoRequest.as_str(), json!({}))
    }

    /// Build an `interrupt_request` (sent on the control channel).
    pub fn interrupt_request() -> Self {
        Self::new(MessageType::InterruptRequest.as_str(), json!({}))
    }

    /// Build a message caused by `self`, with `self.header` as parent.
    pub fn child(&self, msg_type: impl Into<String>, content: Value) -> Self {
        let mut child = Self::new(msg_type, content);
        child.header.session = self.header.session.clone();
        if let Ok(Value::Object(parent)) = serde_json::to_value(&self.header) {
            child.parent_header = parent;
        }
        child
    }

    /// Typed message type.
    pub fn msg_type(&self) -> MessageType {
        MessageType::parse(&self.header.msg_type)
    }

    /// The `msg_id` of the request that caused this message, if any.
    pub fn parent_msg_id(&self) -> Option<&str> {
        self.parent_header
            .get("msg_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}
