//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// Framing is broken; the connection cannot continue
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A well-framed payload that did not decode
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The server answered with an error response
    #[error("{kind}: {message}")]
    Remote { kind: String, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Not logged in")]
    NotLoggedIn,
}
