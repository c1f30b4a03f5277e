//! Error types for mailsync-supervisor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required env var: {0}")]
    MissingRequiredInput(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    MalformedInput {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Worker is not healthy")]
    WorkerUnhealthy,
}

pub type Result<T> = std::result::Result<T, Error>;
