//! Long poll configuration.
//!
//! Configuration is loaded with figment from two layered sources, later
//! sources overriding earlier ones:
//!
//! 1. a TOML file (`amalgam.toml` by default)
//! 2. environment variables with the `AMALGAM_` prefix
//!
//! # Environment Variable Mapping
//!
//! - `AMALGAM_GROUP_ID=123` → `group_id = 123`
//! - `AMALGAM_WAIT=60` → `wait = 60`
//!
//! # Example
//!
//! ```rust,ignore
//! use amalgam_runtime::LongPollConfig;
//!
//! // From amalgam.toml + environment
//! let config = LongPollConfig::load()?;
//!
//! // Programmatic
//! let config = LongPollConfig::new(187_853_946).with_wait(60);
//! ```

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Longest wait the Bots Long Poll server accepts, in seconds.
pub const MAX_WAIT: u32 = 90;

/// Default long poll wait, in seconds.
pub const DEFAULT_WAIT: u32 = 25;

/// Settings for one group's long poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LongPollConfig {
    /// Community identifier to poll.
    pub group_id: u64,
    /// Seconds the server may hold a poll request open.
    #[serde(default = "default_wait")]
    pub wait: u32,
}

fn default_wait() -> u32 {
    DEFAULT_WAIT
}

impl LongPollConfig {
    /// Creates a config for one group with the default wait.
    pub fn new(group_id: u64) -> Self {
        Self {
            group_id,
            wait: DEFAULT_WAIT,
        }
    }

    /// Overrides the long poll wait, in seconds.
    pub fn with_wait(mut self, wait: u32) -> Self {
        self.wait = wait;
        self
    }

    /// Loads configuration from `amalgam.toml` and `AMALGAM_` environment
    /// variables.
    pub fn load() -> ConfigResult<Self> {
        Self::from_file("amalgam.toml")
    }

    /// Loads configuration from a specific TOML file, then applies
    /// `AMALGAM_` environment overrides.
    ///
    /// A missing file is not an error; the environment alone may provide
    /// every field.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("AMALGAM_"))
            .extract()?;
        config.validate()?;

        debug!(
            group_id = config.group_id,
            wait = config.wait,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Checks the invariants a usable config must hold.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.group_id == 0 {
            return Err(ConfigError::InvalidGroupId);
        }
        if self.wait > MAX_WAIT {
            return Err(ConfigError::InvalidWait(self.wait));
        }
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The group id was zero.
    #[error("group id must be non-zero")]
    InvalidGroupId,

    /// The wait exceeded the server-side maximum.
    #[error("wait must be at most 90 seconds, got {0}")]
    InvalidWait(u32),

    /// A configuration source failed to load or deserialize.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Tests
// =============================================================================
