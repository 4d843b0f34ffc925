//! Correlation ids.
//!
//! Every execute request carries a correlation id as its `msg_id`. The
//! engine echoes it in `parent_header.msg_id`, which is how results find
//! their way back to a UI element. The id is `<element>` or
//! `<element>#<sub-channel>`; the sub-channel names one of several outputs
//! owned by the same element (for instance one per imported name).

use std::fmt;

/// Correlation id used for the kernel startup script.
///
/// Events caused by it are never routed outward.
pub const STARTUP_CORRELATION_ID: &str = "CODEPOD";

const SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    element_id: String,
    sub_channel: Option<String>,
}

impl CorrelationId {
    /// Correlation id for an element's primary output.
    pub fn primary(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            sub_channel: None,
        }
    }

    /// Correlation id for a named sub-channel of an element.
    pub fn with_sub_channel(element_id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            element_id: element_id.into(),
            sub_channel: (!name.is_empty()).then_some(name),
        }
    }

    /// The startup-script sentinel.
    pub fn startup() -> Self {
        Self::primary(STARTUP_CORRELATION_ID)
    }

    /// Split a raw id on its first `#`. An empty sub-channel is treated as absent.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(SEPARATOR) {
            Some((element_id, name)) => Self::with_sub_channel(element_id, name),
            None => Self::primary(raw),
        }
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn sub_channel(&self) -> Option<&str> {
        self.sub_channel.as_deref()
    }

    pub fn is_startup(&self) -> bool {
        self.sub_channel.is_none() && self.element_id == STARTUP_CORRELATION_ID
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_channel {
            Some(name) => write!(f, "{}{SEPARATOR}{}", self.element_id, name),
            None => f.write_str(&self.element_id),
        }
    }
}
