use std::str::FromStr;
use std::{fs, path::PathBuf};

use common::bucket::DEFAULT_BUCKET_WINDOW_SECS;
use common::directory::{AddressDirectory, DirectoryError};
use common::prelude::{MessageError, MessageService, MessagingOptions, SecretKey, ServiceConfig};
use common::service::{BUCKET_DIR_NAME, STORE_DIR_NAME};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "smsg";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key.pem";
pub const DIRECTORY_FILE_NAME: &str = "addresses.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Whether secure messaging is switched on
    #[serde(default)]
    pub messaging_enabled: bool,
    /// Default log level, overridable with RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Write daily-rolling log files here as well as to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_bucket_window")]
    pub bucket_window_secs: i64,
    #[serde(default)]
    pub options: MessagingOptions,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bucket_window() -> i64 {
    DEFAULT_BUCKET_WINDOW_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            messaging_enabled: false,
            log_level: default_log_level(),
            log_dir: None,
            bucket_window_secs: default_bucket_window(),
            options: MessagingOptions::default(),
        }
    }
}

impl AppConfig {
    /// The configured level, falling back to INFO when it does not parse
    pub fn tracing_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the smsg directory (~/.smsg)
    pub smsg_dir: PathBuf,
    /// Path to the node key PEM file
    pub key_path: PathBuf,
    /// Path to the persisted address directory
    pub directory_path: PathBuf,
    /// Path to the message database
    pub store_path: PathBuf,
    /// Path to the bucket files
    pub bucket_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the smsg directory path (custom or default ~/.smsg)
    pub fn smsg_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn layout(smsg_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            key_path: smsg_dir.join(KEY_FILE_NAME),
            directory_path: smsg_dir.join(DIRECTORY_FILE_NAME),
            store_path: smsg_dir.join(STORE_DIR_NAME),
            bucket_dir: smsg_dir.join(BUCKET_DIR_NAME),
            config_path: smsg_dir.join(CONFIG_FILE_NAME),
            smsg_dir,
            config,
        }
    }

    /// Initialize a new smsg state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let smsg_dir = Self::smsg_dir(custom_path)?;
        if smsg_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&smsg_dir)?;
        let state = Self::layout(smsg_dir, config.unwrap_or_default());
        fs::create_dir_all(&state.bucket_dir)?;

        let key = SecretKey::generate();
        fs::write(&state.key_path, key.to_pem())?;

        AddressDirectory::load(&state.directory_path)?.save()?;
        state.save_config()?;

        Ok(state)
    }

    /// Load existing state from the smsg directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let smsg_dir = Self::smsg_dir(custom_path)?;
        if !smsg_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let mut state = Self::layout(smsg_dir, AppConfig::default());
        if !state.key_path.exists() {
            return Err(StateError::MissingFile(KEY_FILE_NAME.to_string()));
        }
        if !state.config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&state.config_path)?;
        state.config = toml::from_str(&config_toml)?;
        Ok(state)
    }

    pub fn save_config(&self) -> Result<(), StateError> {
        let config_toml = toml::to_string_pretty(&self.config)?;
        fs::write(&self.config_path, config_toml)?;
        Ok(())
    }

    /// Load the secret key from the key file
    pub fn load_key(&self) -> Result<SecretKey, StateError> {
        let pem = fs::read_to_string(&self.key_path)?;
        let key = SecretKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))?;
        Ok(key)
    }

    /// Open the messaging service over this state directory
    pub fn service(&self) -> Result<MessageService, StateError> {
        let service_config = ServiceConfig {
            store_path: self.store_path.clone(),
            bucket_dir: self.bucket_dir.clone(),
            bucket_window: self.config.bucket_window_secs,
            node_key: self.load_key()?,
            enabled: self.config.messaging_enabled,
            options: self.config.options,
        };
        let directory = AddressDirectory::load(&self.directory_path)?;
        Ok(MessageService::with_sealed_box(service_config, directory)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("smsg directory not initialized. Run 'smsg init' first")]
    NotInitialized,

    #[error("smsg directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("address directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("messaging service error: {0}")]
    Service(#[from] MessageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
