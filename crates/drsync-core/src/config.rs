//! Configuration module for DrSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::manifest::SyncFlags;
use crate::domain::newtypes::BackendKind;
use crate::ports::auth_session::Credential;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DrSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub auth: AuthConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// What to synchronize, and where it lives locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend to sync with: `dropbox` or `drive`.
    pub backend: BackendKind,
    /// Categories transferred on upload.
    pub flags: SyncFlags,
    /// The editor's `Installed Packages` directory.
    pub installed_packages_dir: PathBuf,
    /// The editor's `Packages` directory.
    pub packages_dir: PathBuf,
    /// Name of the user folder inside `packages_dir`.
    pub user_folder: String,
    /// Regexes matched against the start of each folder name.
    pub exclude_folder_patterns: Vec<String>,
    /// Regexes matched against the start of each file name.
    pub exclude_file_patterns: Vec<String>,
}

/// Per-backend app credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Dropbox app key/secret. `None` until configured.
    pub dropbox: Option<Credential>,
    /// Google OAuth client. `None` until configured.
    pub drive: Option<Credential>,
    /// Redirect URI registered with the app; the out-of-band flow is used when unset.
    pub redirect_uri: Option<String>,
}

/// HTTP and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Timeout applied to every HTTP request, in seconds.
    pub timeout_secs: u64,
    /// Interval between progress polls, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path`, or [`Config::default`] when no file exists there.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_exists(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drsync")
            .join("config.yaml")
    }

    /// Credential configured for `backend`, if any.
    pub fn credential(&self, backend: BackendKind) -> Option<&Credential> {
        match backend {
            BackendKind::Dropbox => self.auth.dropbox.as_ref(),
            BackendKind::Drive => self.auth.drive.as_ref(),
        }
    }

    /// `packages_dir` joined with the user folder.
    pub fn packages_user_dir(&self) -> PathBuf {
        self.sync.packages_dir.join(&self.sync.user_folder)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn editor_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("sublime-text")
}

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = editor_data_dir();
        Self {
            backend: BackendKind::Dropbox,
            flags: SyncFlags::default(),
            installed_packages_dir: data_dir.join("Installed Packages"),
            packages_dir: data_dir.join("Packages"),
            user_folder: "User".to_string(),
            exclude_folder_patterns: Vec::new(),
            exclude_file_patterns: Vec::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            poll_interval_ms: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"network.timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
/// Compiles an exclusion pattern anchored at the start of a name.
pub fn exclusion_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.user_folder.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.user_folder".into(),
                message: "must not be empty".into(),
            });
        } else if self.sync.user_folder.contains('/') {
            errors.push(ValidationError {
                field: "sync.user_folder".into(),
                message: "must be a single folder name".into(),
            });
        }

        for (field, patterns) in [
            ("sync.exclude_folder_patterns", &self.sync.exclude_folder_patterns),
            ("sync.exclude_file_patterns", &self.sync.exclude_file_patterns),
        ] {
            for (i, pattern) in patterns.iter().enumerate() {
                if let Err(e) = exclusion_regex(pattern) {
                    errors.push(ValidationError {
                        field: format!("{field}[{i}]"),
                        message: format!("invalid pattern '{pattern}': {e}"),
                    });
                }
            }
        }

        // --- auth ---
        for (field, credential) in [("auth.dropbox", &self.auth.dropbox), ("auth.drive", &self.auth.drive)] {
            if let Some(credential) = credential {
                if credential.client_id.trim().is_empty() {
                    errors.push(ValidationError {
                        field: format!("{field}.client_id"),
                        message: "must not be empty".into(),
                    });
                }
            }
        }
        if let Some(uri) = &self.auth.redirect_uri {
            if url::Url::parse(uri).is_err() {
                errors.push(ValidationError {
                    field: "auth.redirect_uri".into(),
                    message: format!("not a valid URL: {uri}"),
                });
            }
        }

        // --- network ---
        if self.network.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "network.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.network.poll_interval_ms == 0 {
            errors.push(ValidationError {
                field: "network.poll_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drsync_core::config::ConfigBuilder;
/// use drsync_core::domain::BackendKind;
///
/// let config = ConfigBuilder::new()
///     .backend(BackendKind::Drive)
///     .network_timeout_secs(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.sync.backend = backend;
        self
    }

    pub fn flags(mut self, flags: SyncFlags) -> Self {
        self.config.sync.flags = flags;
        self
    }

    pub fn installed_packages_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.installed_packages_dir = dir;
        self
    }

    pub fn packages_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.packages_dir = dir;
        self
    }

    pub fn user_folder(mut self, name: impl Into<String>) -> Self {
        self.config.sync.user_folder = name.into();
        self
    }

    pub fn exclude_folder_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.exclude_folder_patterns.push(pattern.into());
        self
    }

    pub fn exclude_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.exclude_file_patterns.push(pattern.into());
        self
    }

    // --- auth ---

    pub fn credential(mut self, backend: BackendKind, credential: Credential) -> Self {
        match backend {
            BackendKind::Dropbox => self.config.auth.dropbox = Some(credential),
            BackendKind::Drive => self.config.auth.drive = Some(credential),
        }
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = Some(uri.into());
        self
    }

    // --- network ---

    pub fn network_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.network.timeout_secs = seconds;
        self
    }

    pub fn network_poll_interval_ms(mut self, millis: u64) -> Self {
        self.config.network.poll_interval_ms = millis;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
