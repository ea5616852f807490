//! Recording error types
//!
//! Errors raised while loading events and schemas from a recording file.

use thiserror::Error;

/// Errors that can occur while reading a recording
#[derive(Error, Debug)]
pub enum RecordingError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The recording is not valid JSON or has the wrong shape
    #[error("Invalid recording: {0}")]
    Json(String),

    /// An event refers to a type that is not declared
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// A value does not match its field descriptor
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<serde_json::Error> for RecordingError {
    fn from(err: serde_json::Error) -> Self {
        RecordingError::Json(err.to_string())
    }
}

/// Result type alias for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecordingError::UnknownEventType("jdk.Missing".to_string());
        assert_eq!(err.to_string(), "Unknown event type: jdk.Missing");

        let err = RecordingError::InvalidValue {
            field: "duration".to_string(),
            message: "expected nanoseconds".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for field 'duration': expected nanoseconds"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RecordingError = io_err.into();
        assert!(matches!(err, RecordingError::Io(_)));
    }
}
