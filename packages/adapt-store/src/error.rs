//! Error types for adapt-store collaborators

use std::fmt;
use thiserror::Error;

/// Store error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend errors (document database, binary store)
    Database,
    /// Serialization/deserialization errors
    Serialization,
    /// Document, tag, asset or plugin not found
    NotFound,
    /// Target already exists (duplicate id, plugin already installed)
    AlreadyExists,
    /// Document rejected by schema validation
    Validation,
    /// Course is locked by another editor
    Locked,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Validation => "validation",
            ErrorKind::Locked => "locked",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StoreError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, format!("Not found: {}", what.into()))
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AlreadyExists,
            format!("Already exists: {}", what.into()),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn locked(course_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Locked,
            format!("Course is locked: {}", course_id.into()),
        )
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::new(ErrorKind::IO, format!("I/O error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("course 5f1a");
        let msg = format!("{}", err);
        assert!(msg.contains("not_found"));
        assert!(msg.contains("course 5f1a"));
    }

    #[test]
    fn test_validation_error() {
        let err = StoreError::validation("title is required");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.source.is_none());
        assert_eq!(format!("{}", err), "[validation] title is required");
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(StoreError::already_exists("adapt-contrib-text").is_already_exists());
        assert!(!StoreError::database("down").is_already_exists());
    }

    #[test]
    fn test_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoreError = io_err.into();

        assert_eq!(err.kind, ErrorKind::IO);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid")
            .err()
            .unwrap();
        let err: StoreError = json_err.into();

        assert_eq!(err.kind, ErrorKind::Serialization);
        assert!(err.message.contains("JSON error"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::Database.as_str(), "database");
        assert_eq!(ErrorKind::AlreadyExists.as_str(), "already_exists");
        assert_eq!(ErrorKind::Locked.as_str(), "locked");
        assert_eq!(ErrorKind::IO.as_str(), "io");
    }
}
