use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::{
    error::ConfigError,
    utils::{is_zero_address, normalize_address},
};

/// Chain RPC connection configuration.
///
/// The RPC endpoint must accept JSON-RPC batch requests; block ranges are
/// fetched as batches of `eth_getBlockByNumber` calls.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub rpc_url: String,
    /// Initial scan floor for accounts with no stored snapshot
    #[serde(default)]
    pub genesis_block: u64,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_milliseconds: u64,
    /// Upper bound on block requests sent in one batched round trip
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_rpc_timeout() -> u64 {
    30_000
}

fn default_max_batch_size() -> usize {
    100
}

/// Sync loop scheduling configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_milliseconds: u64,
    /// Cap for the retry delay after consecutive failures.
    /// Equal to the poll interval by default, which keeps retries on the fixed schedule.
    #[serde(default = "default_poll_interval")]
    pub max_retry_delay_milliseconds: u64,
    /// Consecutive failed cycles before an account is reported as degraded
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_block_cache_capacity")]
    pub block_cache_capacity: u64,
    #[serde(default = "default_block_cache_ttl")]
    pub block_cache_ttl_seconds: u64,
}

fn default_poll_interval() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_block_cache_capacity() -> u64 {
    256
}

fn default_block_cache_ttl() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_milliseconds: default_poll_interval(),
            max_retry_delay_milliseconds: default_poll_interval(),
            failure_threshold: default_failure_threshold(),
            block_cache_capacity: default_block_cache_capacity(),
            block_cache_ttl_seconds: default_block_cache_ttl(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_milliseconds)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_milliseconds)
    }
}

/// Local snapshot persistence.
///
/// When absent, persistence is a no-op and every account starts from the genesis block.
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    pub directory: String,
}

/// A tracked wallet address and the token contracts whose balances are resolved for it.
///
/// The first token is the primary balance; `balances` holds one entry per token in order.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountSettings {
    pub address: String,
    /// Opaque reference to the signing key held elsewhere. Never the key itself.
    #[serde(default)]
    pub key_ref: Option<String>,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup, with `WALLETSYNC_` environment overrides
/// (e.g. `WALLETSYNC_CHAIN__RPC_URL`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub chain: ChainSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub persistence: Option<PersistenceSettings>,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `WALLETSYNC_` prefix, `__` between nested keys.
fn env_overlay() -> Environment {
    Environment::with_prefix("WALLETSYNC")
        .prefix_separator("_")
        .separator("__")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(env_overlay())
            .build()?;

        Self::from_config(s)
    }

    /// Deserialize and validate an already-built [`Config`].
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks numeric bounds and normalises every address to lowercase hex.
    fn validate(&mut self) -> Result<(), ConfigError> {
        Url::parse(&self.chain.rpc_url)
            .map_err(|_| ConfigError::InvalidUrl(self.chain.rpc_url.clone()))?;

        if self.chain.max_batch_size == 0 {
            return Err(ConfigError::Zero("chain.max_batch_size"));
        }
        if self.chain.rpc_timeout_milliseconds == 0 {
            return Err(ConfigError::Zero("chain.rpc_timeout_milliseconds"));
        }
        if self.sync.poll_interval_milliseconds == 0 {
            return Err(ConfigError::Zero("sync.poll_interval_milliseconds"));
        }
        if self.sync.failure_threshold == 0 {
            return Err(ConfigError::Zero("sync.failure_threshold"));
        }

        for (i, account) in self.accounts.iter_mut().enumerate() {
            account.address = match normalize_address(&account.address) {
                Some(address) if !is_zero_address(&address) => address,
                _ => {
                    return Err(ConfigError::InvalidAddress {
                        field: format!("accounts[{i}].address"),
                        value: account.address.clone(),
                    })
                },
            };

            for (j, token) in account.tokens.iter_mut().enumerate() {
                let normalized =
                    normalize_address(token).ok_or_else(|| ConfigError::InvalidAddress {
                        field: format!("accounts[{i}].tokens[{j}]"),
                        value: token.clone(),
                    })?;
                *token = normalized;
            }
        }

        Ok(())
    }
}
