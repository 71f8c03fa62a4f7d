use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("Viewer socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame header too large: {0} bytes")]
    HeaderTooLarge(usize),

    #[error("Malformed binary frame: {0}")]
    MalformedFrame(String),

    #[error("Viewer hub server not started")]
    NotStarted,

    #[error("Viewer hub server already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
