use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::{ErrorContextExt, RelayError, RelayResult};

// Re-export shared types for convenience
pub use crate::shared::config::{ClientSettings, ServerSettings};

pub const SERVER_CONFIG_FILE: &str = "server.toml";
pub const CLIENT_CONFIG_FILE: &str = "client.toml";

/// Load/save contract of the configuration collaborator
pub trait ConfigProvider<T> {
    fn load(&self) -> RelayResult<T>;
    fn save(&self, settings: &T) -> RelayResult<()>;
}

/// Configuration manager for the notification relay
///
/// Settings live as TOML files in one directory: `server.toml` for the
/// listening host and `client.toml` for the sending side.
///
/// # Example
///
/// ```rust,no_run
/// use notify_relay::config::{ConfigManager, ConfigProvider, ServerSettings};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = ConfigManager::new(None)?;
///     let settings: ServerSettings = manager.load()?;
///     println!("Listening on {}:{}", settings.host, settings.port);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager rooted at `config_dir`, or at the user config
    /// directory when `None`
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined or the
    /// directory cannot be created.
    pub fn new(config_dir: Option<PathBuf>) -> RelayResult<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "notify-relay")
                .ok_or_else(|| RelayError::config("Failed to get base directories"))?
                .config_dir()
                .to_path_buf(),
        };

        fs::create_dir_all(&config_dir)
            .in_file_operation(&config_dir, "create config directory")?;

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn server_config_path(&self) -> PathBuf {
        self.config_dir.join(SERVER_CONFIG_FILE)
    }

    pub fn client_config_path(&self) -> PathBuf {
        self.config_dir.join(CLIENT_CONFIG_FILE)
    }

    /// Read a settings file, falling back to defaults when it is unreadable
    /// or malformed. `Ok(None)` means the file does not exist.
    fn read_or_default<T>(path: &Path) -> RelayResult<Option<T>>
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            return Ok(None);
        }

        let parsed = fs::read_to_string(path)
            .in_file_operation(path, "read config file")
            .and_then(|content| {
                toml::from_str(&content)
                    .map_err(|e| RelayError::config_with_source("Failed to parse config file", e))
            });

        match parsed {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                warn!("Failed to load config file {}: {}", path.display(), e);
                Ok(Some(T::default()))
            }
        }
    }

    fn write<T: Serialize>(path: &Path, settings: &T) -> RelayResult<()> {
        let content = toml::to_string_pretty(settings)
            .map_err(|e| RelayError::config_with_source("Failed to serialize config", e))?;
        fs::write(path, content).in_file_operation(path, "write config file")
    }
}

impl ConfigProvider<ServerSettings> for ConfigManager {
    /// A missing server file is created with defaults.
    fn load(&self) -> RelayResult<ServerSettings> {
        let path = self.server_config_path();
        match Self::read_or_default(&path)? {
            Some(settings) => Ok(settings),
            None => {
                let settings = ServerSettings::default();
                Self::write(&path, &settings)?;
                Ok(settings)
            }
        }
    }

    fn save(&self, settings: &ServerSettings) -> RelayResult<()> {
        settings.transport()?;
        Self::write(&self.server_config_path(), settings)
    }
}

impl ConfigProvider<ClientSettings> for ConfigManager {
    fn load(&self) -> RelayResult<ClientSettings> {
        Ok(Self::read_or_default(&self.client_config_path())?.unwrap_or_default())
    }

    fn save(&self, settings: &ClientSettings) -> RelayResult<()> {
        settings.port()?;
        Self::write(&self.client_config_path(), settings)
    }
}
