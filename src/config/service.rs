//! Configuration service system for dependency injection and test isolation.
//!
//! This mirrors the teacher repo's `ConfigService` abstraction
//! (`config/service.rs`): a trait abstracting configuration loading, a
//! production implementation backed by the `config` crate (TOML file +
//! environment variables), and a test implementation for deterministic,
//! file-system-free tests.

use crate::config::{Config, validation};
use crate::error::SubSyncError;
use config::{Config as ConfigCrate, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Configuration service trait for dependency injection.
pub trait ConfigService: Send + Sync {
    /// Get the current configuration, validated.
    fn get_config(&self) -> crate::Result<Config>;

    /// Force a reload of configuration from all sources.
    fn reload(&self) -> crate::Result<()>;

    /// The default configuration file path this service loads from, if any.
    fn config_file_path(&self) -> Option<PathBuf>;
}

/// Production configuration service: loads `config.toml` from the OS
/// config directory (`$CONFIG_DIR/subsync-cli/config.toml`), layered with
/// environment variables prefixed `SUBSYNC_` (e.g. `SUBSYNC_SYNC_PARAMS__MAX_DEV=5000`),
/// falling back to [`Config::default`] when no file is present.
pub struct ProductionConfigService {
    cached: RwLock<Config>,
    path: Option<PathBuf>,
}

impl ProductionConfigService {
    /// Create a new production configuration service, loading and
    /// validating configuration immediately.
    pub fn new() -> crate::Result<Self> {
        let path = default_config_path();
        let config = load_config(path.as_deref())?;
        Ok(Self {
            cached: RwLock::new(config),
            path,
        })
    }

    /// Create a service pinned to an explicit configuration file path.
    pub fn with_path(path: PathBuf) -> crate::Result<Self> {
        let config = load_config(Some(&path))?;
        Ok(Self {
            cached: RwLock::new(config),
            path: Some(path),
        })
    }
}

impl ConfigService for ProductionConfigService {
    fn get_config(&self) -> crate::Result<Config> {
        Ok(self.cached.read().expect("config lock poisoned").clone())
    }

    fn reload(&self) -> crate::Result<()> {
        let fresh = load_config(self.path.as_deref())?;
        *self.cached.write().expect("config lock poisoned") = fresh;
        Ok(())
    }

    fn config_file_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("subsync-cli").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> crate::Result<Config> {
    let mut builder = ConfigCrate::builder();
    if let Some(path) = path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
    }
    builder = builder.add_source(Environment::with_prefix("SUBSYNC").separator("__"));

    let built = builder.build().map_err(SubSyncError::from)?;
    let config: Config = built
        .try_deserialize()
        .unwrap_or_else(|_| Config::default());

    validation::validate_config(&config)?;
    Ok(config)
}
