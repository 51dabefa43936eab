//! Config command - View and manage DrSync configuration
//!
//! Provides the `drsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use drsync_core::config::Config;
use drsync_core::domain::BackendKind;
use drsync_core::ports::Credential;
use tracing::info;

use super::GlobalOptions;
use crate::output::{get_formatter, OutputFormatter};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.backend", "dropbox|drive"),
    ("sync.flags.<name>", "true|false (installed_packages, local_packages, user_directory, ...)"),
    ("sync.installed_packages_dir", "Editor 'Installed Packages' directory"),
    ("sync.packages_dir", "Editor 'Packages' directory"),
    ("sync.user_folder", "User folder inside the packages directory"),
    ("sync.exclude_folder_patterns", "Comma-separated folder name regexes"),
    ("sync.exclude_file_patterns", "Comma-separated file name regexes"),
    ("auth.<backend>.client_id", "App key / OAuth client id"),
    ("auth.<backend>.client_secret", "App secret / OAuth client secret ('none' clears)"),
    ("auth.<backend>.scopes", "Comma-separated OAuth scopes"),
    ("auth.redirect_uri", "Registered redirect URI ('none' clears)"),
    ("network.timeout_secs", "HTTP request timeout in seconds"),
    ("network.poll_interval_ms", "Progress poll interval in milliseconds"),
    ("logging.level", "trace|debug|info|warn|error"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.backend")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let fmt = get_formatter(options.is_json());
        match self {
            ConfigCommand::Show => self.execute_show(options, &*fmt),
            ConfigCommand::Set { key, value } => self.execute_set(options, key, value, &*fmt),
            ConfigCommand::Validate => self.execute_validate(options, &*fmt),
            ConfigCommand::Path => {
                let path = options.config_path.display().to_string();
                if options.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "config_path": path,
                        "exists": options.config_path.exists(),
                    }));
                } else {
                    println!("{path}");
                }
                Ok(())
            }
        }
    }

    fn execute_show(&self, options: &GlobalOptions, fmt: &dyn OutputFormatter) -> Result<()> {
        let config_path = &options.config_path;
        let config = Config::load_if_exists(config_path)?;

        info!(config_path = %config_path.display(), "Showing configuration");

        if options.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("Configuration ({})", config_path.display()));
            fmt.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                fmt.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(
        &self,
        options: &GlobalOptions,
        key: &str,
        value: &str,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let config_path = &options.config_path;
        let mut config = Config::load_if_exists(config_path)?;

        info!(key = %key, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if options.is_json() {
                fmt.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": format!("{e:#}"),
                }));
            } else {
                fmt.error(&format!("Failed to set '{}': {:#}", key, e));
                fmt.info("");
                fmt.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    fmt.info(&format!("  {name:<32} - {description}"));
                }
            }
            return Ok(());
        }

        let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            if options.is_json() {
                fmt.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                fmt.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        config
            .save(config_path)
            .context("Failed to write configuration file")?;

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            fmt.success(&format!("Set {} = {}", key, value));
            fmt.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, options: &GlobalOptions, fmt: &dyn OutputFormatter) -> Result<()> {
        let config_path = &options.config_path;

        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {e}")
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if options.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else if config_path.exists() {
                    fmt.error(&message);
                    fmt.info(&format!("File: {}", config_path.display()));
                } else {
                    fmt.info(&format!("Configuration file not found at {}", config_path.display()));
                    fmt.info("Using default configuration. Run 'drsync config set <key> <value>' to create one.");
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();
        if options.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            fmt.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            fmt.success("Configuration is valid");
            fmt.info(&format!("File: {}", config_path.display()));
        } else {
            fmt.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            fmt.info(&format!("File: {}", config_path.display()));
            fmt.info("");
            for error in &errors {
                fmt.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    if let Some(flag) = key.strip_prefix("sync.flags.") {
        let enabled = value
            .parse::<bool>()
            .context("Expected true or false")?;
        config.sync.flags.set(flag, enabled)?;
        return Ok(());
    }

    if let Some(rest) = key.strip_prefix("auth.") {
        if let Some((backend, field)) = rest.split_once('.') {
            let backend: BackendKind = backend.parse()?;
            return apply_credential_value(config, backend, field, value);
        }
    }

    match key {
        // --- sync ---
        "sync.backend" => {
            config.sync.backend = value.parse()?;
        }
        "sync.installed_packages_dir" => {
            config.sync.installed_packages_dir = PathBuf::from(value);
        }
        "sync.packages_dir" => {
            config.sync.packages_dir = PathBuf::from(value);
        }
        "sync.user_folder" => {
            config.sync.user_folder = value.to_string();
        }
        "sync.exclude_folder_patterns" => {
            config.sync.exclude_folder_patterns = split_list(value);
        }
        "sync.exclude_file_patterns" => {
            config.sync.exclude_file_patterns = split_list(value);
        }

        // --- auth ---
        "auth.redirect_uri" => {
            config.auth.redirect_uri = optional(value);
        }

        // --- network ---
        "network.timeout_secs" => {
            config.network.timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for network.timeout_secs")?;
        }
        "network.poll_interval_ms" => {
            config.network.poll_interval_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for network.poll_interval_ms")?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

fn apply_credential_value(config: &mut Config, backend: BackendKind, field: &str, value: &str) -> Result<()> {
    let slot = match backend {
        BackendKind::Dropbox => &mut config.auth.dropbox,
        BackendKind::Drive => &mut config.auth.drive,
    };
    let credential = slot.get_or_insert_with(Credential::default);

    match field {
        "client_id" => credential.client_id = value.trim().to_string(),
        "client_secret" => credential.client_secret = optional(value),
        "scopes" => credential.scopes = split_list(value),
        _ => anyhow::bail!("Unknown configuration key: 'auth.{}.{}'", backend, field),
    }
    Ok(())
}

/// Empty or `none` clears an optional value
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
