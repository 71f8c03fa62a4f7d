use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("A status producer is already connected")]
    ProducerConnected,
}

pub type Result<T> = std::result::Result<T, StatusError>;
