//! Cross-platform path utilities for trunkcast.
//!
//! Single source of truth for where the daemon keeps its configuration,
//! captured spectrum recordings and its control socket.
//!
//! # Platform Behavior
//!
//! | Platform | Data Directory | Socket Directory |
//! |----------|----------------|------------------|
//! | Linux    | `~/.local/share/trunkcast` | `$XDG_RUNTIME_DIR` or data dir |
//! | macOS    | `~/Library/Application Support/trunkcast` | Same as data dir |
//! | Windows  | `%APPDATA%/trunkcast` | Same as data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

/// Application identifier used in path construction.
const APP_NAME: &str = "trunkcast";

/// Socket file name for the control socket.
const IPC_SOCKET_NAME: &str = "trunkcast.sock";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Create `dir` (and parents) if missing, owner-only on Unix.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Get the application data directory.
///
/// Creates the directory if it doesn't exist with secure permissions (0o700).
///
/// # Errors
/// Returns an error if the directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().ok_or(PathError::NoDataDirectory)?;
    let data_dir = base_dir.join(APP_NAME);
    ensure_private_dir(&data_dir)?;
    Ok(data_dir)
}

/// Get the configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/trunkcast`
/// - **macOS/Windows**: config lives with data
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
        let config_dir = config_base.join(APP_NAME);
        ensure_private_dir(&config_dir)?;
        Ok(config_dir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Default location of the daemon config file.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the socket directory for the control socket.
///
/// On Linux `$XDG_RUNTIME_DIR` is preferred, everything else uses the data dir.
pub fn get_socket_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return Ok(runtime_dir);
            }
        }
    }

    get_data_dir()
}

/// Get the path to the control socket.
pub fn get_ipc_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(IPC_SOCKET_NAME))
}

/// Get the directory holding captured spectrum recordings.
///
/// - All platforms: `<data_dir>/spectrum`
pub fn get_recordings_dir() -> Result<PathBuf> {
    let recordings_dir = get_data_dir()?.join("spectrum");

    if !recordings_dir.exists() {
        fs::create_dir_all(&recordings_dir).with_context(|| {
            format!(
                "Failed to create recordings directory: {}",
                recordings_dir.display()
            )
        })?;
    }

    Ok(recordings_dir)
}

/// Home directory, used to expand `~/` in configured paths.
pub fn get_home_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir().ok_or(PathError::NoHomeDirectory)?)
}

/// Expand a leading `~/` in a user-supplied path.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(get_home_dir()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Set secure Unix socket permissions (0o600).
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(socket_path, perms).with_context(|| {
            format!(
                "Failed to set socket permissions: {}",
                socket_path.display()
            )
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}
