//! Configuration management

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trunkcast_dispatch::DispatchConfig;
use trunkcast_logwatch::LogWatcherConfig;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Decoder log to tail (`~/` is expanded). Unset disables log tailing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,

    /// How often to retry opening a missing log (ms)
    pub log_retry_interval_ms: u64,

    /// Fallback poll interval while tailing (ms)
    pub log_poll_interval_ms: u64,

    /// Where the decoder's status WebSocket connects
    pub status_listen: SocketAddr,

    /// Where viewers connect
    pub hub_listen: SocketAddr,

    /// Outbound frames queued per viewer before frames are skipped
    pub subscriber_buffer: usize,

    /// Spectrum recordings directory (default: `<data_dir>/spectrum`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordings_dir: Option<String>,

    /// Source index stamped on replayed spectrum packets
    pub replay_source_index: u32,

    /// Control socket path (default: runtime dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipc_socket_path: Option<String>,

    /// Legacy dispatch console bridge; disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            log_path: None,
            log_retry_interval_ms: 2000,
            log_poll_interval_ms: 250,
            status_listen: SocketAddr::from(([127, 0, 0, 1], 3010)),
            hub_listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            subscriber_buffer: 256,
            recordings_dir: None,
            replay_source_index: 0,
            ipc_socket_path: None,
            dispatch: None,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        let path = trunkcast_paths::get_config_file_path()
            .context("Failed to determine config directory")?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            config.config_path = path.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Tailing settings, or `None` if no log is configured
    pub fn log_watcher_config(&self) -> Result<Option<LogWatcherConfig>> {
        let Some(log_path) = &self.log_path else {
            return Ok(None);
        };
        let path = trunkcast_paths::expand_home(log_path)?;
        Ok(Some(
            LogWatcherConfig::new(path)
                .retry_interval(Duration::from_millis(self.log_retry_interval_ms))
                .poll_interval(Duration::from_millis(self.log_poll_interval_ms)),
        ))
    }

    pub fn recordings_dir(&self) -> Result<PathBuf> {
        match &self.recordings_dir {
            Some(dir) => trunkcast_paths::expand_home(dir),
            None => trunkcast_paths::get_recordings_dir(),
        }
    }

    pub fn ipc_socket_path(&self) -> Result<PathBuf> {
        match &self.ipc_socket_path {
            Some(path) => trunkcast_paths::expand_home(path),
            None => trunkcast_paths::get_ipc_socket_path(),
        }
    }
}
