//! Custom error types for audit-trail
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for audit-trail operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// Entity store errors (the primary persistence engine)
    #[error("Store error: {0}")]
    Store(String),

    /// Audit log sink errors (entry persistence)
    #[error("Audit sink error: {0}")]
    Sink(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: u64 },
}

impl AuditError {
    /// Create a "not found" error for an entity type
    pub fn not_found(entity_type: &'static str, id: u64) -> Self {
        Self::NotFound { entity_type, id }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an audit sink error
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for audit-trail operations
pub type AuditResult<T> = Result<T, AuditError>;
