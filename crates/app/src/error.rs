//! Application error types

/// Application result type
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] hostel_core::Error),

    #[error(transparent)]
    Net(#[from] hostel_net::Error),
}
