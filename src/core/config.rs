/*
 * Manages application configuration: where the remote profile API lives and how
 * to authenticate against it, the request timeout, where the profile cache is
 * stored, and logging. Settings are read from a TOML file (`config.toml` in the
 * per-user config directory unless a path is given explicitly); every key has a
 * default, so a missing file or a partial file is fine.
 *
 * It also persists the id of the last profile the user looked at, so the CLI
 * can be run without repeating it. A trait (`ConfigManagerOperations`) allows
 * mock implementations for testing; `CoreConfigManager` is the file-backed one.
 */
use crate::core::models::{InvalidProfileId, ProfileId};
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "config.toml";
const LAST_PROFILE_ID_FILENAME: &str = "last_profile_id.txt";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    NoConfigDirectory,
    InvalidProfileId(InvalidProfileId),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err)
    }
}

impl From<InvalidProfileId> for ConfigError {
    fn from(err: InvalidProfileId) -> Self {
        ConfigError::InvalidProfileId(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Toml(e) => write!(f, "Configuration file parse error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::InvalidProfileId(e) => write!(f, "Stored last profile id: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Toml(e) => Some(e),
            ConfigError::InvalidProfileId(e) => Some(e),
            ConfigError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    // Header name and value sent with every request, e.g. an API token.
    pub auth_header: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_header: None,
            auth_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // `None` selects the per-user data directory.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            log::warn!("Config: Unknown log level '{}', using 'info'.", self.level);
            log::LevelFilter::Info
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<AppConfig>;
    fn load_last_profile_id(&self, app_name: &str) -> Result<Option<ProfileId>>;
    fn save_last_profile_id(&self, app_name: &str, id: &ProfileId) -> Result<()>;
}

pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    // Uses `dir` instead of the per-user config directory.
    pub fn with_config_dir(dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(dir),
        }
    }

    fn config_dir(&self, app_name: &str) -> Result<PathBuf> {
        match &self.config_dir_override {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoConfigDirectory),
        }
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    /*
     * Loads `config.toml` from the config directory. A missing file yields the
     * default configuration; a malformed one is an error.
     */
    fn load_config(&self, app_name: &str) -> Result<AppConfig> {
        log::trace!("CoreConfigManager: Loading config for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(CONFIG_FILENAME);

        if !file_path.exists() {
            log::debug!("CoreConfigManager: Config file {file_path:?} does not exist, using defaults.");
            return Ok(AppConfig::default());
        }

        let config = AppConfig::from_file(&file_path)?;
        log::debug!("CoreConfigManager: Loaded config from {file_path:?}.");
        Ok(config)
    }

    fn load_last_profile_id(&self, app_name: &str) -> Result<Option<ProfileId>> {
        log::trace!("CoreConfigManager: Loading last profile id for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(LAST_PROFILE_ID_FILENAME);

        if !file_path.exists() {
            log::debug!("CoreConfigManager: Last profile file {file_path:?} does not exist.");
            return Ok(None);
        }

        let mut file = File::open(&file_path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            log::debug!("CoreConfigManager: Last profile file {file_path:?} is empty.");
            Ok(None)
        } else {
            let id = ProfileId::new(trimmed)?;
            log::debug!("CoreConfigManager: Loaded last profile id '{id}' from {file_path:?}.");
            Ok(Some(id))
        }
    }

    fn save_last_profile_id(&self, app_name: &str, id: &ProfileId) -> Result<()> {
        log::trace!("CoreConfigManager: Saving last profile id '{id}' for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(LAST_PROFILE_ID_FILENAME);

        let mut file = File::create(&file_path)?;
        file.write_all(id.as_str().as_bytes())?;
        log::debug!("CoreConfigManager: Saved last profile id '{id}' to {file_path:?}.");
        Ok(())
    }
}
