//! Core error types for gradebook-core.
//!
//! Validation and not-found errors are raised synchronously before any state
//! is touched. Transport errors ([`MailError`]) are never propagated out of a
//! request or a sweep; they only show up in logs and the delivery log.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for gradebook-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown class, student or enrollment
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Mail transport errors
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored snapshot could not be decoded
    #[error("Corrupt snapshot under key '{key}': {message}")]
    CorruptSnapshot { key: String, message: String },

    /// Database is locked or busy past the wait timeout
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field is missing or blank
    #[error("'{0}' is required")]
    Required(&'static str),

    /// Goal outside the configured vocabulary
    #[error("Unknown goal '{goal}'. Must be one of: {allowed}")]
    UnknownGoal { goal: String, allowed: String },

    /// Grade string that is not MANA, MPA or MA
    #[error("Invalid grade '{0}'. Must be MANA, MPA, or MA")]
    InvalidGrade(String),

    /// Negative, NaN or infinite delay
    #[error("Invalid delay: {0} hours")]
    InvalidDelay(f64),

    /// Goal weights of a grading scheme add up to zero
    #[error("Goal weights must not sum to zero")]
    ZeroWeightSum,

    /// Student with this CPF already exists
    #[error("Student with CPF {0} already exists")]
    DuplicateStudent(String),

    /// Student already enrolled in the class
    #[error("Student {cpf} is already enrolled in class {class_id}")]
    AlreadyEnrolled { class_id: String, cpf: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Lookup failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Class not found: {0}")]
    Class(String),

    #[error("Student not found: {0}")]
    Student(String),

    #[error("Student not enrolled: {cpf} in class {class_id}")]
    Enrollment { class_id: String, cpf: String },
}

/// Mail transport errors.
#[derive(Error, Debug)]
pub enum MailError {
    /// Transport is not configured (missing relay URL, bad address)
    #[error("Mail transport not configured: {0}")]
    NotConfigured(String),

    /// Recipient address rejected before sending
    #[error("Invalid recipient address: '{0}'")]
    InvalidRecipient(String),

    /// HTTP request failed
    #[error("Mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Relay answered with a non-success status
    #[error("Mail relay error (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy
                ) {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
