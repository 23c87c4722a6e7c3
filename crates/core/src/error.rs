//! Error types for Hostel Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-readable category, stable across versions
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "authentication",
            Error::PermissionDenied(_) => "permission_denied",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::InvalidOperation(_) => "invalid_operation",
            Error::Database(_)
            | Error::PasswordHash(_)
            | Error::Io(_)
            | Error::Serialization(_) => "internal",
        }
    }

    /// Whether the message is safe to show to the requester
    pub fn is_user_facing(&self) -> bool {
        self.kind() != "internal"
    }
}

pub type Result<T> = std::result::Result<T, Error>;
