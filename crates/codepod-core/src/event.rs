//! Outward events delivered to the attached client.
//!
//! Serialized as `{"type": ..., "payload": {...}}`. Results for a named
//! sub-channel of an element use the `IO:` prefixed type and carry the
//! sub-channel as `name`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::lang::Language;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub lang: Language,
    pub status: String,
    /// Element whose request caused the status change, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Engine content: `data` MIME bundle, `metadata` and `execution_count`.
    pub content: Value,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPayload {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StdoutPayload {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stdout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    pub element_id: String,
    /// Stream content as sent by the engine (`name` and `text`).
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub stacktrace: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reply status: `ok`, `error` or `aborted`.
    pub result: String,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptReplyPayload {
    pub status: Value,
    pub lang: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum KernelEvent {
    #[serde(rename = "status")]
    Status(StatusPayload),
    #[serde(rename = "execute_result")]
    ExecuteResult(ResultPayload),
    #[serde(rename = "IO:execute_result")]
    IoExecuteResult(ResultPayload),
    #[serde(rename = "display_data")]
    DisplayData(DisplayPayload),
    #[serde(rename = "stdout")]
    Stdout(StdoutPayload),
    #[serde(rename = "IO:stdout")]
    IoStdout(StdoutPayload),
    #[serde(rename = "stream")]
    Stream(StreamPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "IO:error")]
    IoError(ErrorPayload),
    #[serde(rename = "execute_reply")]
    ExecuteReply(ReplyPayload),
    #[serde(rename = "IO:execute_reply")]
    IoExecuteReply(ReplyPayload),
    #[serde(rename = "interrupt_reply")]
    InterruptReply(InterruptReplyPayload),
}

impl KernelEvent {
    /// Status event telling the client its kernel is still starting.
    pub fn starting(lang: Language) -> Self {
        KernelEvent::Status(StatusPayload {
            lang,
            status: "starting".to_string(),
            id: None,
        })
    }

    /// Error event reporting a runtime failure for `element_id`.
    pub fn failure(element_id: Option<&str>, error: &Error) -> Self {
        KernelEvent::Error(ErrorPayload {
            element_id: element_id.map(str::to_string),
            name: None,
            ename: error.kind().to_string(),
            evalue: error.to_string(),
            stacktrace: Vec::new(),
        })
    }

    /// The wire `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            KernelEvent::Status(_) => "status",
            KernelEvent::ExecuteResult(_) => "execute_result",
            KernelEvent::IoExecuteResult(_) => "IO:execute_result",
            KernelEvent::DisplayData(_) => "display_data",
            KernelEvent::Stdout(_) => "stdout",
            KernelEvent::IoStdout(_) => "IO:stdout",
            KernelEvent::Stream(_) => "stream",
            KernelEvent::Error(_) => "error",
            KernelEvent::IoError(_) => "IO:error",
            KernelEvent::ExecuteReply(_) => "execute_reply",
            KernelEvent::IoExecuteReply(_) => "IO:execute_reply",
            KernelEvent::InterruptReply(_) => "interrupt_reply",
        }
    }

    /// Element the event belongs to, if any.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            KernelEvent::Status(p) => p.id.as_deref(),
            KernelEvent::ExecuteResult(p) | KernelEvent::IoExecuteResult(p) => Some(&p.element_id),
            KernelEvent::DisplayData(p) => Some(&p.element_id),
            KernelEvent::Stdout(p) | KernelEvent::IoStdout(p) => Some(&p.element_id),
            KernelEvent::Stream(p) => Some(&p.element_id),
            KernelEvent::Error(p) | KernelEvent::IoError(p) => p.element_id.as_deref(),
            KernelEvent::ExecuteReply(p) | KernelEvent::IoExecuteReply(p) => Some(&p.element_id),
            KernelEvent::InterruptReply(_) => None,
        }
    }
}
