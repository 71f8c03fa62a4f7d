//! Unix socket IPC server for control commands
//!
//! One command per connection, one line back:
//!
//! ```text
//! replay <id> [loop] | pause | resume | stop | status | recordings | clients
//! record <id> [max] | record stop
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

use crate::daemon::Daemon;

/// IPC command
#[derive(Debug, PartialEq)]
pub enum IpcCommand {
    Replay { id: String, looping: bool },
    Record { id: String, max: Option<usize> },
    RecordStop,
    Pause,
    Resume,
    Stop,
    Status,
    Recordings,
    Clients,
}

impl IpcCommand {
    pub fn parse(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let Some(verb) = words.next() else {
            anyhow::bail!("Empty command");
        };

        let command = match verb.to_lowercase().as_str() {
            "replay" => {
                let Some(id) = words.next() else {
                    anyhow::bail!("Usage: replay <id> [loop]");
                };
                let looping = match words.next() {
                    None => false,
                    Some(flag) if flag.eq_ignore_ascii_case("loop") => true,
                    Some(other) => anyhow::bail!("Unknown replay option: {}", other),
                };
                Self::Replay {
                    id: id.to_string(),
                    looping,
                }
            }
            "record" => match words.next() {
                None => anyhow::bail!("Usage: record <id> [max] | record stop"),
                Some(arg) if arg.eq_ignore_ascii_case("stop") => Self::RecordStop,
                Some(id) => {
                    let max = match words.next() {
                        None => None,
                        Some(max) => match max.parse::<usize>() {
                            Ok(max) if max > 0 => Some(max),
                            _ => anyhow::bail!("Invalid snapshot limit: {}", max),
                        },
                    };
                    Self::Record {
                        id: id.to_string(),
                        max,
                    }
                }
            },
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "stop" => Self::Stop,
            "status" => Self::Status,
            "recordings" | "list" => Self::Recordings,
            "clients" => Self::Clients,
            _ => anyhow::bail!("Unknown command: {}", s.trim()),
        };

        if words.next().is_some() {
            anyhow::bail!("Unexpected arguments: {}", s.trim());
        }
        Ok(command)
    }
}

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    daemon: Arc<Daemon>,
}

impl IpcServer {
    /// Create new IPC server
    pub fn new(socket_path: &Path, daemon: Arc<Daemon>) -> Result<Self> {
        // Remove existing socket if it exists
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path).context("Failed to bind Unix socket")?;
        trunkcast_paths::secure_socket_permissions(socket_path)?;

        info!("IPC server listening on {}", socket_path.display());

        Ok(Self { listener, daemon })
    }

    /// Accept next IPC connection
    pub async fn accept(&mut self) -> Result<(UnixStream, Arc<Daemon>)> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok((stream, self.daemon.clone()))
    }

    /// Serve connections until an accept fails
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let (stream, daemon) = self.accept().await?;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, daemon).await {
                    error!("IPC connection error: {}", e);
                }
            });
        }
    }
}

/// Handle a single IPC connection
pub async fn handle_connection(mut stream: UnixStream, daemon: Arc<Daemon>) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    debug!("Received IPC command: {}", request.trim());

    let result = match IpcCommand::parse(&request) {
        Ok(IpcCommand::Replay { id, looping }) => daemon.replay(&id, looping).await,
        Ok(IpcCommand::Record { id, max }) => daemon.record(&id, max),
        Ok(IpcCommand::RecordStop) => daemon.record_stop().await,
        Ok(IpcCommand::Pause) => daemon.pause().await,
        Ok(IpcCommand::Resume) => daemon.resume().await,
        Ok(IpcCommand::Stop) => daemon.stop().await,
        Ok(IpcCommand::Status) => daemon.status().await,
        Ok(IpcCommand::Recordings) => daemon.recordings().await,
        Ok(IpcCommand::Clients) => daemon.clients(),
        Err(e) => Err(e),
    };

    let mut response = match result {
        Ok(msg) => msg,
        Err(e) => format!("Error: {}", e),
    };
    response.push('\n');

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            IpcCommand::parse("replay scan-1\n").unwrap(),
            IpcCommand::Replay {
                id: "scan-1".into(),
                looping: false
            }
        );
        assert_eq!(
            IpcCommand::parse("REPLAY scan-1 loop").unwrap(),
            IpcCommand::Replay {
                id: "scan-1".into(),
                looping: true
            }
        );
        assert_eq!(IpcCommand::parse(" pause ").unwrap(), IpcCommand::Pause);
        assert_eq!(IpcCommand::parse("list").unwrap(), IpcCommand::Recordings);
        assert_eq!(IpcCommand::parse("clients").unwrap(), IpcCommand::Clients);
        assert_eq!(
            IpcCommand::parse("record night-scan 600").unwrap(),
            IpcCommand::Record {
                id: "night-scan".into(),
                max: Some(600)
            }
        );
        assert_eq!(
            IpcCommand::parse("record quick").unwrap(),
            IpcCommand::Record {
                id: "quick".into(),
                max: None
            }
        );
        assert_eq!(IpcCommand::parse("record STOP").unwrap(), IpcCommand::RecordStop);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(IpcCommand::parse("").is_err());
        assert!(IpcCommand::parse("replay").is_err());
        assert!(IpcCommand::parse("replay a forever").is_err());
        assert!(IpcCommand::parse("status now").is_err());
        assert!(IpcCommand::parse("toggle").is_err());
        assert!(IpcCommand::parse("record").is_err());
        assert!(IpcCommand::parse("record a 0").is_err());
        assert!(IpcCommand::parse("record a lots").is_err());
        assert!(IpcCommand::parse("record stop now").is_err());
    }
}
