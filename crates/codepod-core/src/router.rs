//! Routes engine messages to outward events.
//!
//! Each engine message carries the correlation id of the request that caused
//! it in `parent_header.msg_id`. The router splits that id into element and
//! sub-channel and turns the message into a [`KernelEvent`]. Anything caused
//! by the startup script is swallowed.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{
    DisplayPayload, ErrorPayload, InterruptReplyPayload, KernelEvent, ReplyPayload, ResultPayload,
    StatusPayload, StdoutPayload, StreamPayload,
};
use crate::lang::Language;
use crate::transport::Channel;
use crate::wire::{CorrelationId, MessageType, WireMessage};

/// Legacy stdout messages starting with this carry binary payloads the
/// client cannot render.
const BINARY_STDOUT_PREFIX: &str = "base64 binary data";

/// Message router for one kernel.
#[derive(Debug, Clone, Copy)]
pub struct MessageRouter {
    language: Language,
}

impl MessageRouter {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Route a message received on `channel`.
    ///
    /// Control replies are handled like shell replies.
    pub fn route(&self, channel: Channel, message: &WireMessage) -> Result<Option<KernelEvent>> {
        match channel {
            Channel::IOPub => self.route_iopub(message),
            Channel::Shell | Channel::Control => Ok(self.route_shell(message)),
        }
    }

    /// Route a broadcast output.
    ///
    /// # Errors
    /// [`Error::InvalidStreamType`] for a stream named other than
    /// stdout/stderr.
    pub fn route_iopub(&self, message: &WireMessage) -> Result<Option<KernelEvent>> {
        let correlation = message.parent_msg_id().map(CorrelationId::parse);
        if correlation.as_ref().is_some_and(CorrelationId::is_startup) {
            return Ok(None);
        }
        let content = &message.content;

        if message.msg_type() == MessageType::Status {
            return Ok(Some(KernelEvent::Status(StatusPayload {
                lang: self.language,
                status: str_field(content, "execution_state"),
                id: message.parent_msg_id().map(str::to_string),
            })));
        }

        let Some(correlation) = correlation else {
            debug!(
                "Dropping {} without parent message id",
                message.header.msg_type
            );
            return Ok(None);
        };
        let element_id = correlation.element_id().to_string();
        let name = correlation.sub_channel().map(str::to_string);

        let event = match message.msg_type() {
            MessageType::ExecuteResult => {
                let payload = ResultPayload {
                    element_id,
                    name,
                    content: content.clone(),
                    count: content.get("execution_count").and_then(Value::as_u64),
                };
                if payload.name.is_some() {
                    KernelEvent::IoExecuteResult(payload)
                } else {
                    KernelEvent::ExecuteResult(payload)
                }
            }
            MessageType::DisplayData => KernelEvent::DisplayData(DisplayPayload {
                element_id,
                name,
                content: content.clone(),
            }),
            MessageType::Stdout => {
                let text = str_field(content, "text");
                if text.starts_with(BINARY_STDOUT_PREFIX) {
                    warn!("Dropping binary stdout for {}", element_id);
                    return Ok(None);
                }
                let payload = StdoutPayload {
                    element_id,
                    name,
                    stdout: text,
                };
                if payload.name.is_some() {
                    KernelEvent::IoStdout(payload)
                } else {
                    KernelEvent::Stdout(payload)
                }
            }
            MessageType::Stream => {
                let stream = str_field(content, "name");
                match stream.as_str() {
                    "stdout" | "stderr" => KernelEvent::Stream(StreamPayload {
                        element_id,
                        content: content.clone(),
                    }),
                    _ => return Err(Error::InvalidStreamType(stream)),
                }
            }
            MessageType::Error => {
                let payload = ErrorPayload {
                    element_id: Some(element_id),
                    name,
                    ename: str_field(content, "ename"),
                    evalue: str_field(content, "evalue"),
                    stacktrace: content
                        .get("traceback")
                        .and_then(Value::as_array)
                        .map(|lines| {
                            lines
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                };
                if payload.name.is_some() {
                    KernelEvent::IoError(payload)
                } else {
                    KernelEvent::Error(payload)
                }
            }
            MessageType::ExecuteInput => return Ok(None),
            other => {
                debug!("Ignoring iopub message {}", other.as_str());
                return Ok(None);
            }
        };
        Ok(Some(event))
    }

    /// Route a shell or control reply.
    pub fn route_shell(&self, message: &WireMessage) -> Option<KernelEvent> {
        let content = &message.content;
        match message.msg_type() {
            MessageType::ExecuteReply => {
                let correlation = CorrelationId::parse(message.parent_msg_id()?);
                if correlation.is_startup() {
                    return None;
                }
                let payload = ReplyPayload {
                    element_id: correlation.element_id().to_string(),
                    name: correlation.sub_channel().map(str::to_string),
                    result: str_field(content, "status"),
                    count: content.get("execution_count").and_then(Value::as_u64),
                };
                Some(if payload.name.is_some() {
                    KernelEvent::IoExecuteReply(payload)
                } else {
                    KernelEvent::ExecuteReply(payload)
                })
            }
            MessageType::InterruptReply => Some(KernelEvent::InterruptReply(InterruptReplyPayload {
                status: content.clone(),
                lang: self.language,
            })),
            MessageType::KernelInfoReply => {
                debug!("Kernel info reply for {}", self.language);
                None
            }
            other => {
                debug!("Ignoring shell message {}", other.as_str());
                None
            }
        }
    }
}

fn str_field(content: &Value, key: &str) -> String {
    content
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
