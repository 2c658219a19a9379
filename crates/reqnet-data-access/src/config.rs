//! Configuration types for the data-access layer

use crate::error::{DataAccessError, DataAccessResult};
use reqnet_pending::PendingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_network() -> String {
    "private".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_content_store_ms() -> u64 {
    10_000
}

fn default_chain_anchor_ms() -> u64 {
    30_000
}

fn default_chain_indexer_ms() -> u64 {
    10_000
}

fn default_confirmation_poll_ms() -> u64 {
    1_000
}

fn default_prune_interval_secs() -> u64 {
    60
}

/// Data-access configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccessConfig {
    /// Anchoring network name, resolved against the chain registry
    #[serde(default = "default_network")]
    pub network: String,
    /// Retry policy for collaborator calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-collaborator timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Pending store limits
    #[serde(default)]
    pub pending: PendingConfig,
    /// Read path behavior
    #[serde(default)]
    pub read: ReadConfig,
    /// Interval between reads while waiting for a confirmation
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
    /// Interval between background prunes
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl Default for DataAccessConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            pending: PendingConfig::default(),
            read: ReadConfig::default(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl DataAccessConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> DataAccessResult<Self> {
        let config: DataAccessConfig =
            serde_json::from_str(json).map_err(|e| DataAccessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> DataAccessResult<Self> {
        let path = path.as_ref();
        tracing::info!("Loading data-access config from {:?}", path);
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataAccessError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> DataAccessResult<()> {
        if self.network.is_empty() {
            return Err(DataAccessError::Config("network must not be empty".into()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(DataAccessError::Config(format!(
                "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.initial_delay_ms, self.retry.max_delay_ms
            )));
        }
        let timeouts = [
            ("timeouts.content_store_ms", self.timeouts.content_store_ms),
            ("timeouts.chain_anchor_ms", self.timeouts.chain_anchor_ms),
            ("timeouts.chain_indexer_ms", self.timeouts.chain_indexer_ms),
            ("confirmation_poll_ms", self.confirmation_poll_ms),
            ("prune_interval_secs", self.prune_interval_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(DataAccessError::Config(format!("{} must be positive", name)));
        }
        if self.pending.max_entries == 0 || self.pending.max_per_channel == 0 {
            return Err(DataAccessError::Config("pending limits must be positive".into()));
        }
        if self.pending.max_per_channel > self.pending.max_entries {
            return Err(DataAccessError::Config(
                "pending.max_per_channel exceeds pending.max_entries".into(),
            ));
        }
        Ok(())
    }

    /// Confirmation poll interval
    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }

    /// Background prune interval
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound of a single delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Randomize delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

/// Collaborator timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Content store call timeout
    #[serde(default = "default_content_store_ms")]
    pub content_store_ms: u64,
    /// Chain anchor call timeout
    #[serde(default = "default_chain_anchor_ms")]
    pub chain_anchor_ms: u64,
    /// Chain indexer call timeout
    #[serde(default = "default_chain_indexer_ms")]
    pub chain_indexer_ms: u64,
}

impl TimeoutConfig {
    /// Content store timeout
    pub fn content_store(&self) -> Duration {
        Duration::from_millis(self.content_store_ms)
    }

    /// Chain anchor timeout
    pub fn chain_anchor(&self) -> Duration {
        Duration::from_millis(self.chain_anchor_ms)
    }

    /// Chain indexer timeout
    pub fn chain_indexer(&self) -> Duration {
        Duration::from_millis(self.chain_indexer_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            content_store_ms: default_content_store_ms(),
            chain_anchor_ms: default_chain_anchor_ms(),
            chain_indexer_ms: default_chain_indexer_ms(),
        }
    }
}

/// Read path configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Serve a pending-only, degraded view when the indexer is unreachable
    #[serde(default)]
    pub fallback_to_pending: bool,
}
