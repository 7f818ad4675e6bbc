//! Configuration for prune runs.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [defaults]
//! prune_method = "destroy"
//! in_batches = true
//!
//! [models.sessions]
//! created_after_days = ${SESSION_RETENTION_DAYS}
//! ```

mod models;
mod observability;

use std::{collections::BTreeMap, path::Path, sync::LazyLock};

pub use models::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::prune::{PruneMethod, PruneOptions};

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Root configuration.
///
/// All sections are optional. A file with no `[models]` is valid: models
/// may also be registered in code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PruneConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Options applied to runs started from this configuration.
    #[serde(default)]
    pub defaults: PruneOptions,

    /// Models that opt into pruning, keyed by model name.
    #[serde(default)]
    pub models: BTreeMap<String, ModelPruneConfig>,
}

impl PruneConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: PruneConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(method) = &self.defaults.prune_method {
            method.parse::<PruneMethod>().map_err(|_| {
                ConfigError::Validation(format!(
                    "defaults.prune_method must be \"destroy\" or \"delete\", got {:?}",
                    method
                ))
            })?;
        }

        if self.defaults.batch_size == Some(0) {
            return Err(ConfigError::Validation(
                "defaults.batch_size must be greater than zero".into(),
            ));
        }

        for (name, model) in &self.models {
            model.validate(name)?;
        }

        Ok(())
    }

    /// A loader that registers every configured model.
    pub fn model_loader(&self) -> ConfigModelLoader {
        ConfigModelLoader::new(self.models.clone())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
