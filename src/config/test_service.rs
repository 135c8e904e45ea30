//! Test configuration service and builder for isolated testing.
//!
//! Mirrors the teacher repo's `config/test_service.rs`: a fixed, in-memory
//! `ConfigService` implementation plus a builder for constructing configs
//! with specific parameter overrides, so tests never touch the filesystem.

use crate::config::service::ConfigService;
use crate::config::{AdParams, Config, PhraseParams, RiftParams, SyncParams};
use std::path::PathBuf;

/// Test configuration service implementation.
///
/// Holds a fixed configuration; `reload` is a no-op.
pub struct TestConfigService {
    fixed_config: Config,
}

impl TestConfigService {
    /// Create a new test configuration service with the provided configuration.
    pub fn new(config: Config) -> Self {
        Self {
            fixed_config: config,
        }
    }

    /// Create a test configuration service with default settings.
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigService for TestConfigService {
    fn get_config(&self) -> crate::Result<Config> {
        Ok(self.fixed_config.clone())
    }

    fn reload(&self) -> crate::Result<()> {
        Ok(())
    }

    fn config_file_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Builder for constructing [`Config`] values with specific overrides in
/// tests, without hand-writing every field.
#[derive(Default)]
pub struct TestConfigBuilder {
    config: Config,
}

impl TestConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Override the sync-decision parameters.
    pub fn with_sync_params(mut self, params: SyncParams) -> Self {
        self.config.sync_params = params;
        self
    }

    /// Override the rift-search parameters.
    pub fn with_rift_params(mut self, params: RiftParams) -> Self {
        self.config.rift_params = params;
        self
    }

    /// Override the phrase-key thresholds.
    pub fn with_phrase_params(mut self, params: PhraseParams) -> Self {
        self.config.phrase_params = params;
        self
    }

    /// Override the ad-detection parameters.
    pub fn with_ad_params(mut self, params: AdParams) -> Self {
        self.config.ad_params = params;
        self
    }

    /// Lower `min_ref_pts` so small fixture datasets can trigger adjustment.
    pub fn with_min_ref_pts(mut self, min_ref_pts: usize) -> Self {
        self.config.sync_params.min_ref_pts = min_ref_pts;
        self
    }

    /// Finish building and return the assembled [`Config`].
    pub fn build_config(self) -> Config {
        self.config
    }

    /// Finish building and wrap the config in a [`TestConfigService`].
    pub fn build_service(self) -> TestConfigService {
        TestConfigService::new(self.config)
    }
}
