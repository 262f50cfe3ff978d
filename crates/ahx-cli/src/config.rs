//! CLI configuration.
//!
//! Loaded from a TOML file and `AHX__*` environment variables, e.g.
//! `AHX__STORE__PATH=/var/lib/ahx` or `AHX__AUTH__SIGNING__ALGORITHM=ES256`.

use std::path::PathBuf;

use ahx_auth::AuthConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ahx.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory the file store writes to.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ahx"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store.path.as_os_str().is_empty() {
            anyhow::bail!("store.path cannot be empty");
        }
        self.auth.validate().context("invalid [auth] section")?;
        Ok(())
    }
}

/// Loads the configuration.
///
/// A missing file is not an error; defaults and the environment still apply.
/// `PUBLIC_KEY_MAX_ARCHIVED_AGE` is applied last.
pub fn load_config(path: Option<&str>) -> Result<CliConfig> {
    let mut builder = Config::builder();
    let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }
    builder = builder.add_source(
        Environment::with_prefix("AHX")
            .try_parsing(true)
            .separator("__"),
    );

    let mut merged: CliConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    merged.auth.apply_env_overrides();
    merged.validate()?;
    Ok(merged)
}
