//! Error types for codepod-core.

use thiserror::Error;

/// Result type for codepod-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in codepod-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Frames did not form a valid multipart message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// HMAC signature did not match the payload.
    #[error("bad message signature")]
    BadSignature,

    /// A payload frame was not valid JSON.
    #[error("invalid JSON in frame {frame}: {message}")]
    Json { frame: usize, message: String },

    /// Stream message named something other than stdout/stderr.
    #[error("invalid stream type: {0}")]
    InvalidStreamType(String),

    /// Language adapter called without a required argument.
    #[error("invalid adapter input: {0}")]
    InvalidAdapterInput(String),

    /// No adapter exists for the requested language.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Kernel could not be started or connected.
    #[error("kernel spawn failed for {key}: {message}")]
    Spawn { key: String, message: String },

    /// Container started but never reported a network address.
    #[error("no network address for {name} on network {network}")]
    AddressUnavailable { name: String, network: String },

    /// Container runtime reported an error.
    #[error("container error: {0}")]
    Container(String),

    /// Underlying socket failure.
    #[error("transport error on {channel}: {message}")]
    Transport { channel: String, message: String },

    /// Send attempted on a channel whose loop has stopped.
    #[error("channel {0} is closed")]
    ChannelClosed(String),

    /// A receive loop is already consuming this transport.
    #[error("transport listener already active")]
    ListenerActive,

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Kernelspec missing or unreadable.
    #[error("kernelspec error: {0}")]
    KernelSpec(String),

    /// Serialization error outside of frame decoding.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a spawn failure for a registry key.
    pub fn spawn(key: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Spawn {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Short machine-readable name, used as `ename` in outward error events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedMessage(_) | Error::Json { .. } => "DecodeError",
            Error::BadSignature => "BadSignature",
            Error::InvalidStreamType(_) => "InvalidStreamType",
            Error::InvalidAdapterInput(_) => "InvalidAdapterInput",
            Error::UnsupportedLanguage(_) => "UnsupportedLanguage",
            Error::Spawn { .. } | Error::AddressUnavailable { .. } | Error::KernelSpec(_) => {
                "KernelUnavailable"
            }
            Error::Container(_) => "ContainerError",
            Error::Transport { .. } | Error::ChannelClosed(_) | Error::ListenerActive => {
                "TransportError"
            }
            Error::Config(_) => "ConfigError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
        }
    }

    /// Render the error together with a recovery hint for terminal output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::KernelSpec(_) => Some(
                "install a Jupyter kernel for the language (e.g. `pip install ipykernel`) \
                 or point --kernelspec-dir at its kernels directory",
            ),
            Error::Container(_) | Error::AddressUnavailable { .. } => {
                Some("check that the docker daemon is running and the kernel network exists")
            }
            Error::Spawn { .. } => Some("run with --verbose to see kernel process output"),
            Error::UnsupportedLanguage(_) => {
                Some("supported languages are python, julia, racket and javascript")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
