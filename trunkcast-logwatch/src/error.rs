use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogWatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Log watcher already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, LogWatchError>;
