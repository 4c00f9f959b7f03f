//! ppk-opener runtime configuration
//!
//! Combines the TOML bootstrap file from ppk-common with command-line and
//! environment overrides into one resolved [`Config`].

use crate::error::{Error, Result};
use ppk_common::config::{
    load_toml_config, AudioConfig, FolderKind, RequestDefaults, RootFolderResolver,
    ScannerConfig, TomlConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub cache_folder: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved opener configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub token: String,
    pub timeout: Option<Duration>,
    pub request: RequestDefaults,

    /// Saved archive location (private storage)
    pub archive_path: PathBuf,

    /// Extraction directory (cache area)
    pub extract_dir: PathBuf,

    pub keep_artifacts: bool,
    pub audio: AudioConfig,
    pub scanner: ScannerConfig,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load the TOML file (if any) and apply overrides
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = load_toml_config(overrides.config_file.as_deref())?;
        Self::from_parts(toml_config, overrides)
    }

    /// Resolve a configuration from an already parsed TOML file.
    ///
    /// The token is the only setting without a default: a missing token is a
    /// configuration error.
    pub fn from_parts(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let TomlConfig {
            api,
            request,
            storage,
            audio,
            scanner,
            logging,
        } = toml_config;

        let token = overrides
            .token
            .or(api.token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "API token not configured (set api.token, {} or --token)",
                    ppk_common::config::API_TOKEN_ENV
                ))
            })?;

        let root_folder = RootFolderResolver::new(FolderKind::Root)
            .with_cli_arg(overrides.root_folder)
            .with_toml_value(storage.root_folder)
            .resolve();
        let cache_folder = RootFolderResolver::new(FolderKind::Cache)
            .with_cli_arg(overrides.cache_folder)
            .with_toml_value(storage.cache_folder)
            .resolve();

        let config = Self {
            endpoint: overrides.endpoint.unwrap_or(api.endpoint),
            token,
            timeout: api.timeout_secs.map(Duration::from_secs),
            request,
            archive_path: root_folder.join(&storage.archive_file_name),
            extract_dir: cache_folder.join(&storage.extract_dir_name),
            keep_artifacts: storage.keep_artifacts,
            audio,
            scanner,
            log_level: overrides.log_level.unwrap_or(logging.level),
            log_file: logging.file,
        };

        info!(
            endpoint = %config.endpoint,
            archive = %config.archive_path.display(),
            extract_dir = %config.extract_dir.display(),
            "Configuration resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides_with_folders() -> ConfigOverrides {
        ConfigOverrides {
            root_folder: Some(PathBuf::from("/tmp/ppk-root")),
            cache_folder: Some(PathBuf::from("/tmp/ppk-cache")),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let result = Config::from_parts(TomlConfig::default(), overrides_with_folders());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_token_overrides_toml() {
        let mut toml_config = TomlConfig::default();
        toml_config.api.token = Some("from-file".into());

        let overrides = ConfigOverrides {
            token: Some("from-cli".into()),
            ..overrides_with_folders()
        };
        let config = Config::from_parts(toml_config, overrides).unwrap();
        assert_eq!(config.token, "from-cli");
    }

    #[test]
    fn test_storage_paths_joined_from_folders() {
        let mut toml_config = TomlConfig::default();
        toml_config.api.token = Some("t".into());

        let config = Config::from_parts(toml_config, overrides_with_folders()).unwrap();
        assert_eq!(config.archive_path, PathBuf::from("/tmp/ppk-root/test.zip"));
        assert_eq!(config.extract_dir, PathBuf::from("/tmp/ppk-cache/extracted_audio"));
        assert!(config.timeout.is_none());
    }
}
