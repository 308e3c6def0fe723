//! Error types for survey relay.

use std::path::PathBuf;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Email provider error: {0}")]
    Email(#[from] EmailError),

    #[error("Record service error: {0}")]
    Record(#[from] RecordError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV roster ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Email delivery provider errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Record-keeping service errors.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Insert into table {table} rejected: {detail}")]
    Rejected { table: String, detail: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
