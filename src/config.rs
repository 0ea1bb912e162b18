//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir),
//! 3. `GALLERY_SYNC_*` environment variables (`__` separates nested keys,
//!    e.g. `GALLERY_SYNC_ARCHIVE__ENABLED=true`),
//! 4. command-line flags, applied by the caller.
//!
//! # Example
//!
//! ```toml
//! images_dir = "/srv/gallery/images"
//! convert_small_opts = "-resize 400x300 -quality 85 -strip"
//!
//! [archive]
//! enabled = true
//! dir = "gallery-backup"
//! access_token = "ya29..."
//! ```

use crate::archive::drive::{DriveSettings, DEFAULT_API_BASE, DEFAULT_UPLOAD_BASE};
use crate::pipeline::{ConvertCommand, Profile, ProfileKind, ProfileSet, DEFAULT_PROGRAM};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GALLERY_SYNC_";

/// Reference sync interval: once a day.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider could not be read or a value had the wrong type.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The merged configuration is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Remote archive settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Run the background sync scheduler.
    pub enabled: bool,
    /// Run a first pass at startup instead of waiting one interval.
    pub sync_on_startup: bool,
    /// Remote folder everything is uploaded into.
    pub dir: String,
    pub interval_secs: u64,
    pub api_base: String,
    pub upload_base: String,
    /// OAuth bearer token for the Drive API.
    pub access_token: String,
    pub request_timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_on_startup: false,
            dir: "gallery-backup".to_string(),
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            access_token: String::new(),
            request_timeout_secs: 120,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding primary assets.
    pub images_dir: PathBuf,
    /// Target directory of the small variants.
    pub small_dir: PathBuf,
    /// Target directory of the medium variants.
    pub medium_dir: PathBuf,
    /// SQLite record store file.
    pub database: PathBuf,
    /// Transform executable.
    pub convert_program: String,
    /// Space-separated transform parameters for the small variant.
    pub convert_small_opts: String,
    /// Space-separated transform parameters for the medium variant.
    pub convert_medium_opts: String,
    /// Kill the transform after this many seconds (0 disables the limit).
    pub transform_timeout_secs: u64,
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            small_dir: PathBuf::from("small"),
            medium_dir: PathBuf::from("medium"),
            database: PathBuf::from("gallery.db"),
            convert_program: DEFAULT_PROGRAM.to_string(),
            convert_small_opts: "-resize 400x300 -quality 85 -strip".to_string(),
            convert_medium_opts: "-resize 1200x900 -quality 90 -strip".to_string(),
            transform_timeout_secs: 120,
            archive: ArchiveConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, then `path` (or the default config file), then the
    /// environment.
    ///
    /// A missing file is not an error; figment simply skips it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);
        if let Some(file) = &file {
            log::debug!("Loading configuration from {}", file.display());
        }
        Self::figment(file.as_deref())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// The provider stack behind [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "gallery-sync", "gallery-sync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject settings that would only fail later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("images_dir must not be empty".into()));
        }
        if self.small_dir == self.medium_dir {
            return Err(ConfigError::Invalid(
                "small_dir and medium_dir must differ".into(),
            ));
        }
        if self.archive.enabled {
            if self.archive.interval_secs == 0 {
                return Err(ConfigError::Invalid(
                    "archive.interval_secs must be greater than zero".into(),
                ));
            }
            if self.archive.access_token.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "archive.access_token is required when the archive is enabled".into(),
                ));
            }
            if self.archive.dir.trim().is_empty() {
                return Err(ConfigError::Invalid("archive.dir must not be empty".into()));
            }
        }
        Ok(())
    }

    /// The small and medium profiles.
    #[must_use]
    pub fn profiles(&self) -> ProfileSet {
        ProfileSet::new(
            Profile::from_opts(ProfileKind::Small, &self.small_dir, &self.convert_small_opts),
            Profile::from_opts(ProfileKind::Medium, &self.medium_dir, &self.convert_medium_opts),
        )
    }

    /// The external transform, with its timeout.
    #[must_use]
    pub fn transform(&self) -> ConvertCommand {
        let command = ConvertCommand::new(&self.convert_program);
        if self.transform_timeout_secs == 0 {
            command
        } else {
            command.with_timeout(Duration::from_secs(self.transform_timeout_secs))
        }
    }

    /// Connection settings for the Drive client.
    #[must_use]
    pub fn drive_settings(&self) -> DriveSettings {
        DriveSettings {
            api_base: self.archive.api_base.trim_end_matches('/').to_string(),
            upload_base: self.archive.upload_base.trim_end_matches('/').to_string(),
            access_token: self.archive.access_token.clone(),
            timeout: Duration::from_secs(self.archive.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.archive.interval_secs)
    }
}
