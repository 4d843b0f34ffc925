//! Kernel wire protocol.
//!
//! Multipart messages exchanged with an execution engine over its shell,
//! control and IOPub channels, plus the correlation ids used to route
//! replies back to the UI element that caused them.

pub mod codec;
pub mod correlation;
pub mod message;

pub use codec::{DELIMITER, SigningKey, decode, encode};
pub use correlation::{CorrelationId, STARTUP_CORRELATION_ID};
pub use message::{Header, MessageType, PROTOCOL_VERSION, WireMessage};
