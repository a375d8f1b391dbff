//! Error types for tsrelay

use std::fmt;

/// Result type alias for tsrelay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tsrelay
///
/// `Config` and `Precondition` abort a whole invocation. Every other variant
/// describes the failure of one unit of work (one queue message, one
/// document, one write call) and is reported against that unit.
#[derive(Debug)]
pub enum Error {
    /// Missing or invalid configuration parameter
    Config(String),
    /// A destination the invocation depends on does not exist
    Precondition(String),
    /// Object store errors
    ObjectStore(object_store::Error),
    /// Serialization errors
    Serialization(String),
    /// Time-series query failures
    Query(String),
    /// Time-series write transport failures (not content rejections)
    Write(String),
    /// Queue send failures
    Queue(String),
    /// Topic publish failures
    Topic(String),
    /// Inbound queue message not shaped as expected
    InvalidMessage(String),
    /// Payload content failed validation
    InvalidPayload(String),
    /// Internal error
    Internal(String),
}

impl Error {
    /// Whether this error must abort the invocation instead of failing a
    /// single unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Precondition(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ObjectStore(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Precondition(msg) => write!(f, "Precondition failed: {}", msg),
            Error::ObjectStore(e) => write!(f, "Object store error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
            Error::Write(msg) => write!(f, "Write error: {}", msg),
            Error::Queue(msg) => write!(f, "Queue error: {}", msg),
            Error::Topic(msg) => write!(f, "Topic error: {}", msg),
            Error::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Error::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        Error::ObjectStore(e)
    }
}

impl From<object_store::path::Error> for Error {
    fn from(e: object_store::path::Error) -> Self {
        Error::InvalidMessage(format!("invalid object path: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Config("BLOCKSIZE".into()).is_fatal());
        assert!(Error::Precondition("table".into()).is_fatal());
        assert!(!Error::Write("timeout".into()).is_fatal());
        assert!(!Error::InvalidMessage("no body".into()).is_fatal());
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
