//! Core error types for Vigil

use thiserror::Error;

/// Main error type for Vigil storage operations
#[derive(Error, Debug)]
pub enum VigilError {
    /// Data or metadata is absent, could not be decoded, or the backend
    /// does not support the requested read.
    #[error("Read error: {0}")]
    Read(String),

    /// Serialization failed, the append destination is missing, or the
    /// backend is unavailable.
    #[error("Write error: {0}")]
    Write(String),

    /// Incoming schema conflicts with the stored schema.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Malformed caller input, such as a row range with `end <= start`.
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

impl VigilError {
    /// Wrap a read failure with model and operation context.
    pub fn read(model_id: &str, operation: &str, message: impl std::fmt::Display) -> Self {
        VigilError::Read(format!(
            "Error {} for model={}: {}",
            operation, model_id, message
        ))
    }

    /// Wrap a write failure with model and operation context.
    pub fn write(model_id: &str, operation: &str, message: impl std::fmt::Display) -> Self {
        VigilError::Write(format!(
            "Error {} for model={}: {}",
            operation, model_id, message
        ))
    }

    /// Reject a row range whose end does not lie after its start.
    pub fn bad_range(key: &str, start: usize, end: usize) -> Self {
        VigilError::IllegalArgument(format!(
            "Range read of {} requires end > start. Got start={}, end={}",
            key, start, end
        ))
    }

    pub fn is_read(&self) -> bool {
        matches!(self, VigilError::Read(_))
    }

    pub fn is_write(&self) -> bool {
        matches!(self, VigilError::Write(_))
    }

    pub fn is_invalid_schema(&self) -> bool {
        matches!(self, VigilError::InvalidSchema(_))
    }

    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, VigilError::IllegalArgument(_))
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        VigilError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let read = VigilError::Read("missing".to_string());
        assert_eq!(format!("{}", read), "Read error: missing");

        let write = VigilError::Write("disk full".to_string());
        assert_eq!(format!("{}", write), "Write error: disk full");

        let schema = VigilError::InvalidSchema("extra column".to_string());
        assert_eq!(format!("{}", schema), "Invalid schema: extra column");

        let arg = VigilError::IllegalArgument("end <= start".to_string());
        assert_eq!(format!("{}", arg), "Illegal argument: end <= start");

        let config = VigilError::Configuration("missing bucket".to_string());
        assert_eq!(format!("{}", config), "Configuration error: missing bucket");

        let io_error = VigilError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(format!("{}", io_error).contains("IO error"));
    }

    #[test]
    fn test_context_helpers() {
        let err = VigilError::read("model-a", "reading metadata", "no such key");
        assert!(err.is_read());
        assert_eq!(
            err.to_string(),
            "Read error: Error reading metadata for model=model-a: no such key"
        );

        let err = VigilError::write("model-b", "saving dataframe", "bucket gone");
        assert!(err.is_write());
        assert!(err.to_string().contains("model=model-b"));

        let err = VigilError::bad_range("model-c-data", 5, 5);
        assert!(err.is_illegal_argument());
        assert!(err.to_string().contains("start=5, end=5"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: VigilError = io_err.into();

        match err {
            VigilError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse_result: Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{invalid json}");
        let err: VigilError = parse_result.unwrap_err().into();

        match err {
            VigilError::Serialization(msg) => assert!(msg.contains("key must be a string")),
            _ => panic!("Expected Serialization error variant"),
        }
    }
}
