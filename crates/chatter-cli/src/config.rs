//! Chatter2 server configuration management
//!
//! Configuration is layered with the priority CLI flags > config file >
//! defaults. The file is TOML with a `[server]` table mirroring
//! `ServerConfig` and a `[logging]` table.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::Level;

use chatter_core::ServerConfig;

use crate::cli::Cli;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the server binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Protocol engine and listener settings
    pub server: ServerConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,

    /// Include the module target in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Effective level; `--verbose` forces at least DEBUG
    pub fn max_level(&self, verbose: bool) -> Result<Level> {
        let level: Level = self
            .level
            .parse()
            .map_err(|_| CliError::Config(format!("unknown log level '{}'", self.level)))?;
        if verbose && level < Level::DEBUG {
            Ok(Level::DEBUG)
        } else {
            Ok(level)
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file; missing keys take defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply command line overrides on top of file values
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(name) = &cli.name {
            self.server.server_name = name.clone();
        }
        if let Some(id) = cli.id {
            self.server.server_id = id;
        }
        if cli.no_heartbeat {
            self.server.heartbeat_enabled = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.logging.max_level(false)?;
        Ok(())
    }
}
