//! WebSocket framing.
//!
//! Every text frame from the client is one [`ClientCommand`]; every frame
//! sent back is one [`KernelEvent`]. Frames that do not parse are answered
//! with an `error` event instead of closing the socket.

use codepod_core::event::ErrorPayload;
use codepod_core::{ClientCommand, KernelEvent};

use crate::error::{ServerError, ServerResult};

/// Parse one inbound text frame.
pub fn parse_command(text: &str) -> ServerResult<ClientCommand> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize one outbound event.
pub fn encode_event(event: &KernelEvent) -> ServerResult<String> {
    Ok(serde_json::to_string(event)?)
}

/// Error event for a failure that belongs to no kernel.
pub fn error_event(error: &ServerError) -> KernelEvent {
    KernelEvent::Error(ErrorPayload {
        element_id: None,
        name: None,
        ename: error.kind().to_string(),
        evalue: error.to_string(),
        stacktrace: Vec::new(),
    })
}
