//! Configuration
//!
//! Layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. A TOML file: `--config` path, else `$STASIS_CONFIG_PATH`, else an
//!    optional `stasis.toml` in the working directory
//! 3. `STASIS_*` environment variables, `__` separating nested keys
//!    (`STASIS_LIMITS__MAX_STEPS=5000`)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::ResourceLimits;

pub const ENV_PREFIX: &str = "STASIS";
pub const CONFIG_PATH_VAR: &str = "STASIS_CONFIG_PATH";
const DEFAULT_FILE_STEM: &str = "stasis";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: ResourceLimits,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default locations and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_steps == 0 {
            return Err(ConfigError::Invalid("limits.max_steps must be positive".into()));
        }
        if self.limits.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_call_depth must be positive".into(),
            ));
        }
        let depth = self.limits.max_value_depth;
        if depth == 0 || depth > ResourceLimits::MAX_VALUE_DEPTH_CEILING {
            return Err(ConfigError::Invalid(format!(
                "limits.max_value_depth must be between 1 and {}",
                ResourceLimits::MAX_VALUE_DEPTH_CEILING
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    env: Option<config::Map<String, String>>,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read variables from `vars` instead of the process environment
    pub fn env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let env_path = match &self.env {
            Some(vars) => vars.get(CONFIG_PATH_VAR).cloned(),
            None => std::env::var(CONFIG_PATH_VAR).ok(),
        };

        let file = match self.config_path.or_else(|| env_path.map(PathBuf::from)) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                config::File::from(path).required(true)
            }
            None => config::File::with_name(DEFAULT_FILE_STEM).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}
