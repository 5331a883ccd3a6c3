//! Shared error type across dockprom crates.

use thiserror::Error;

/// Stable error codes (used as log fields and in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Target vanished.
    NotFound,
    /// Runtime query or transport failed.
    Runtime,
    /// Malformed runtime response or snapshot.
    Decode,
    /// A metric was requested with a label-key set that differs from its first registration.
    LabelMismatch,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Runtime => "RUNTIME",
            ErrorKind::Decode => "DECODE",
            ErrorKind::LabelMismatch => "LABEL_MISMATCH",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Recoverable errors affect one target or one cycle and are retried by the next observation.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::NotFound | ErrorKind::Runtime | ErrorKind::Decode)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, DockpromError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum DockpromError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("runtime: {0}")]
    Runtime(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("label mismatch on {metric}: registered with {expected:?}, got {got:?}")]
    LabelMismatch {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl DockpromError {
    /// Map the error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockpromError::NotFound(_) => ErrorKind::NotFound,
            DockpromError::Runtime(_) => ErrorKind::Runtime,
            DockpromError::Decode(_) => ErrorKind::Decode,
            DockpromError::LabelMismatch { .. } => ErrorKind::LabelMismatch,
            DockpromError::Config(_) => ErrorKind::Config,
            DockpromError::Internal(_) => ErrorKind::Internal,
        }
    }
}
