//! Configuration loading via `ortho-config`.
//!
//! The recognised environment variables keep the `HA_` prefix
//! (`HA_URL`, `HA_TOKEN`, `HA_VERIFY_SSL`, `HA_TIMEOUT`, ...). Values merge
//! defaults, `blueprint-sync.toml`, and the environment.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::marker::{DEFAULT_MARKER, DeploymentMarker};

/// Controller address used when none is configured.
pub const DEFAULT_URL: &str = "http://supervisor/core";

/// Request timeout in seconds used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Template root used when none is configured.
pub const DEFAULT_BLUEPRINTS_DIR: &str = "blueprints";

/// Canonical raw-source location of the template tree.
pub const DEFAULT_SOURCE_BASE_URL: &str =
    "https://raw.githubusercontent.com/chatondearu/mirabelle-ha-blueprints/main/blueprints";

const CONFIG_FILE: &str = "blueprint-sync.toml";

/// Settings for reaching the controller and locating templates.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HA",
    discovery(
        app_name = "blueprint-sync",
        env_var = "BLUEPRINT_SYNC_CONFIG_PATH",
        config_file_name = "blueprint-sync.toml",
        dotfile_name = ".blueprint-sync.toml",
        project_file_name = "blueprint-sync.toml"
    )
)]
pub struct ControllerConfig {
    /// Base URL of the controller.
    #[ortho_config(default = DEFAULT_URL.to_owned())]
    pub url: String,
    /// Long-lived access token. Optional at load time; every flow that
    /// talks to the controller requires it.
    pub token: Option<String>,
    /// Whether to verify the controller's TLS certificate.
    #[ortho_config(default = true)]
    pub verify_ssl: bool,
    /// Per-request timeout in seconds.
    #[ortho_config(default = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Directory holding one subdirectory per domain of templates.
    #[ortho_config(default = DEFAULT_BLUEPRINTS_DIR.to_owned())]
    pub blueprints_dir: String,
    /// Location templates are published at; a template's source is
    /// `{source_base_url}/{identifier}`.
    #[ortho_config(default = DEFAULT_SOURCE_BASE_URL.to_owned())]
    pub source_base_url: String,
    /// Deployment marker token.
    #[ortho_config(default = DEFAULT_MARKER.to_owned())]
    pub marker: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn guidance(&self) -> String {
        format!(
            "set {} or add {} to {CONFIG_FILE}",
            self.env_var, self.toml_key
        )
    }
}

const URL_FIELD: FieldMetadata = FieldMetadata::new("controller URL", "HA_URL", "url");
const TOKEN_FIELD: FieldMetadata = FieldMetadata::new("access token", "HA_TOKEN", "token");
const TIMEOUT_FIELD: FieldMetadata = FieldMetadata::new("request timeout", "HA_TIMEOUT", "timeout");
const BLUEPRINTS_DIR_FIELD: FieldMetadata =
    FieldMetadata::new("blueprint directory", "HA_BLUEPRINTS_DIR", "blueprints_dir");
const SOURCE_BASE_URL_FIELD: FieldMetadata =
    FieldMetadata::new("blueprint source URL", "HA_SOURCE_BASE_URL", "source_base_url");
const MARKER_FIELD: FieldMetadata = FieldMetadata::new("deployment marker", "HA_MARKER", "marker");

impl ControllerConfig {
    /// Builds a configuration for `url` with every other field at its
    /// documented default.
    #[must_use]
    pub fn for_controller(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT_SECS,
            blueprints_dir: DEFAULT_BLUEPRINTS_DIR.to_owned(),
            source_base_url: DEFAULT_SOURCE_BASE_URL.to_owned(),
            marker: DEFAULT_MARKER.to_owned(),
        }
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("blueprint-sync")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name both the
    /// environment variable and the configuration file key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for blank values and
    /// [`ConfigError::Invalid`] for values that cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.url, &URL_FIELD)?;
        Self::require_http(&self.url, &URL_FIELD)?;
        Self::require_field(&self.blueprints_dir, &BLUEPRINTS_DIR_FIELD)?;
        Self::require_field(&self.source_base_url, &SOURCE_BASE_URL_FIELD)?;
        Self::require_http(&self.source_base_url, &SOURCE_BASE_URL_FIELD)?;
        if self.timeout == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                TIMEOUT_FIELD.description,
                TIMEOUT_FIELD.guidance()
            )));
        }
        if DeploymentMarker::new(&self.marker).is_none() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                MARKER_FIELD.description,
                MARKER_FIELD.guidance()
            )));
        }
        Ok(())
    }

    /// Returns the token, or an actionable error when it is absent or blank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no usable token is set.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                TOKEN_FIELD.description,
                TOKEN_FIELD.guidance()
            ))),
        }
    }

    /// Returns `true` when a non-blank token is configured.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.require_token().is_ok()
    }

    /// Controller base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    /// Template source base URL without a trailing slash.
    #[must_use]
    pub fn source_base(&self) -> &str {
        self.source_base_url.trim().trim_end_matches('/')
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Template root directory.
    #[must_use]
    pub fn blueprints_root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.blueprints_dir.trim())
    }

    /// Parsed deployment marker, falling back to the default for a blank
    /// token (which [`ControllerConfig::validate`] rejects).
    #[must_use]
    pub fn deployment_marker(&self) -> DeploymentMarker {
        DeploymentMarker::new(&self.marker).unwrap_or_default()
    }

    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.guidance()
            )));
        }
        Ok(())
    }

    fn require_http(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(());
        }
        Err(ConfigError::Invalid(format!(
            "{} must start with http:// or https://, got '{trimmed}': {}",
            metadata.description,
            metadata.guidance()
        )))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
