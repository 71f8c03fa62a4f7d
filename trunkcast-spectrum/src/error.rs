use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("Invalid recording id: {0:?}")]
    InvalidId(String),

    #[error("Replayer has shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, SpectrumError>;
