//! Bootstrap configuration and storage folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`PPK_ROOT_FOLDER`, `PPK_CACHE_FOLDER`, `PPK_API_TOKEN`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing configuration file is not an error: a warning is logged and the
//! compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the private storage folder
pub const ROOT_FOLDER_ENV: &str = "PPK_ROOT_FOLDER";

/// Environment variable overriding the cache folder
pub const CACHE_FOLDER_ENV: &str = "PPK_CACHE_FOLDER";

/// Environment variable carrying the API bearer token
pub const API_TOKEN_ENV: &str = "PPK_API_TOKEN";

/// Sandbox open-box endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api-d4me-stage.direct4.me/sandbox/v1/Access/openbox";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub api: ApiConfig,
    pub request: RequestDefaults,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
}

/// Remote access-control API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Full URL of the open-box endpoint
    pub endpoint: String,

    /// Bearer token. No compiled default; must be configured.
    pub token: Option<String>,

    /// Request timeout in seconds (None = HTTP client default)
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout_secs: None,
        }
    }
}

/// Fixed fields sent with every open-box request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub delivery_id: i64,
    pub token_format: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub qr_code_info: Option<String>,
    pub terminal_seed: i64,
    pub is_multibox: bool,
    pub door_index: i32,
    pub add_access_log: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            delivery_id: 12345,
            token_format: 4,
            latitude: 46.056946,
            longitude: 14.505751,
            qr_code_info: None,
            terminal_seed: 111222,
            is_multibox: false,
            door_index: 0,
            add_access_log: true,
        }
    }
}

/// Where the downloaded archive and the extracted entries live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Private storage folder holding the saved archive
    pub root_folder: Option<PathBuf>,

    /// Cache folder holding the extraction directory
    pub cache_folder: Option<PathBuf>,

    /// File name of the saved archive inside the root folder
    pub archive_file_name: String,

    /// Directory name of the extracted entries inside the cache folder
    pub extract_dir_name: String,

    /// Keep archive and extracted files after the cycle
    pub keep_artifacts: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            cache_folder: None,
            archive_file_name: "test.zip".to_string(),
            extract_dir_name: "extracted_audio".to_string(),
            keep_artifacts: false,
        }
    }
}

/// Audio playback settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Archive entry that holds the audio token
    pub expected_entry: String,

    /// Output device name (None = system default)
    pub device: Option<String>,

    /// Playback volume, 0.0-1.0
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            expected_entry: "token.wav".to_string(),
            device: None,
            volume: 1.0,
        }
    }
}

/// Barcode scanner settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub prompt: String,
    pub beep: bool,

    /// Device node of a line-oriented barcode reader (None = stdin)
    pub device: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            prompt: "Scan a QR code".to_string(),
            beep: false,
            device: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(Error::InvalidInput(format!(
                "audio.volume must be within 0.0-1.0, got {}",
                self.audio.volume
            )));
        }
        if self.storage.archive_file_name.is_empty() || self.storage.extract_dir_name.is_empty() {
            return Err(Error::InvalidInput(
                "storage.archive_file_name and storage.extract_dir_name must not be empty".to_string(),
            ));
        }
        if self.audio.expected_entry.is_empty() {
            return Err(Error::InvalidInput("audio.expected_entry must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Load bootstrap configuration.
///
/// An explicit `path` must exist and parse. Without one, the platform config
/// file is used if present, otherwise compiled defaults.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = TomlConfig::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    match find_config_file() {
        Some(found) => {
            let content = std::fs::read_to_string(&found)?;
            let config = TomlConfig::from_toml_str(&content)?;
            info!("Loaded configuration from {}", found.display());
            Ok(config)
        }
        None => {
            warn!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Locate the platform configuration file, if any
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ppk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/ppk/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Which folder a resolver is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    /// Private storage (saved archive)
    Root,
    /// Cache area (extraction directory)
    Cache,
}

impl FolderKind {
    fn env_var(self) -> &'static str {
        match self {
            FolderKind::Root => ROOT_FOLDER_ENV,
            FolderKind::Cache => CACHE_FOLDER_ENV,
        }
    }
}

/// Resolves a storage folder following CLI > env > TOML > OS default
pub struct RootFolderResolver {
    kind: FolderKind,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(kind: FolderKind) -> Self {
        Self {
            kind,
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve the folder path
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("{:?} folder from command line: {}", self.kind, path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(self.kind.env_var()) {
            if !path.is_empty() {
                debug!("{:?} folder from {}: {}", self.kind, self.kind.env_var(), path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            debug!("{:?} folder from config file: {}", self.kind, path.display());
            return path.clone();
        }

        default_folder(self.kind)
    }
}

/// OS-dependent default folder
pub fn default_folder(kind: FolderKind) -> PathBuf {
    let base = match kind {
        FolderKind::Root => dirs::data_local_dir(),
        FolderKind::Cache => dirs::cache_dir(),
    };

    match base {
        Some(dir) => dir.join("ppk"),
        None => match kind {
            FolderKind::Root => PathBuf::from("./ppk_data"),
            FolderKind::Cache => PathBuf::from("./ppk_cache"),
        },
    }
}

/// Create directory (and parents) if missing
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_match_sandbox_values() {
        let defaults = RequestDefaults::default();
        assert_eq!(defaults.delivery_id, 12345);
        assert_eq!(defaults.token_format, 4);
        assert_eq!(defaults.terminal_seed, 111222);
        assert!(defaults.qr_code_info.is_none());
        assert!(!defaults.is_multibox);
        assert!(defaults.add_access_log);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.api.endpoint, DEFAULT_ENDPOINT);
        assert!(config.api.token.is_none());
        assert_eq!(config.storage.archive_file_name, "test.zip");
        assert_eq!(config.storage.extract_dir_name, "extracted_audio");
        assert_eq!(config.audio.expected_entry, "token.wav");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [request]
            delivery_id = 7

            [api]
            token = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.request.delivery_id, 7);
        assert_eq!(config.request.token_format, 4);
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_volume_out_of_range_rejected() {
        let result = TomlConfig::from_toml_str("[audio]\nvolume = 1.5\n");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_expected_entry_rejected() {
        let result = TomlConfig::from_toml_str("[audio]\nexpected_entry = \"\"\n");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = TomlConfig::from_toml_str("[api\nendpoint = ");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_default_folders_differ() {
        assert_ne!(default_folder(FolderKind::Root), default_folder(FolderKind::Cache));
    }
}
