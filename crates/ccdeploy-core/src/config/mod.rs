//! Configuration for the coordinator.
//!
//! Configuration is layered once at startup:
//! - built-in defaults
//! - ccdeploy.toml (explicit path, or the per-user default if it exists)
//! - peer CLI environment variables
//!
//! The resulting `CoordinatorConfig` is validated and then shared read-only
//! by every component.

pub mod env;
pub mod parser;
pub mod paths;
pub mod schema;

use std::path::{Path, PathBuf};

pub use env::apply_env;
pub use parser::{parse_config, parse_config_str};
pub use paths::default_config_path;
pub use schema::{
    ChaincodeConfig, CliConfig, CoordinatorConfig, NetworkConfig, OrdererConfig, PeerConfig,
    ServerConfig,
};

/// Loads a `CoordinatorConfig` from file and environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    explicit: bool,
}

impl ConfigLoader {
    /// Loader for an explicit file, or the default location when `None`.
    pub fn new(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self {
                path: Some(path.to_path_buf()),
                explicit: true,
            },
            None => Self {
                path: default_config_path(),
                explicit: false,
            },
        }
    }

    /// Resolved config file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load using the process environment.
    pub fn load(&self) -> anyhow::Result<CoordinatorConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with_env<F>(&self, lookup: F) -> anyhow::Result<CoordinatorConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.path {
            Some(path) if path.exists() => parse_config(path)?,
            Some(path) if self.explicit => {
                anyhow::bail!("Config file not found: {}", path.display())
            }
            _ => CoordinatorConfig::new(),
        };

        apply_env(&mut config, lookup);
        config.validate()?;
        Ok(config)
    }
}
