//! Error taxonomy for the sync engine.
//!
//! None of these are fatal to the process: every loop logs the error and keeps
//! its schedule. The binary and the manager glue use `anyhow` on top.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Failure talking to the chain RPC.
///
/// Carries rendered messages instead of the transport error so that one coalesced
/// failure can be cloned out to every caller waiting on the same range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
    #[error("batch returned {got} responses for {expected} requests")]
    ShortBatch { expected: usize, got: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<alloy::transports::TransportError> for ChainError {
    fn from(err: alloy::transports::TransportError) -> Self {
        Self::Rpc(err.to_string())
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}

/// Any failure fetching a block range. Aborts the current cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("failed to fetch blocks [{from_block}, {to_block}]: {source}")]
    Chain {
        from_block: u64,
        to_block: u64,
        #[source]
        source: ChainError,
    },
    #[error("malformed batch response: expected block {expected}, got block {got}")]
    Malformed { expected: u64, got: u64 },
    #[error("invalid block range [{from_block}, {to_block}]")]
    InvalidRange { from_block: u64, to_block: u64 },
    #[error("failed to read chain head: {0}")]
    Head(#[source] ChainError),
}

/// Failure calling a token contract's `balanceOf`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("balanceOf({owner}) on {contract} failed: {source}")]
pub struct BalanceQueryError {
    pub contract: String,
    pub owner: String,
    #[source]
    pub source: ChainError,
}

/// Failure at the snapshot store boundary.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Settings that parsed but do not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
    #[error("invalid address {value:?} in {field}")]
    InvalidAddress { field: String, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("invalid rpc url {0:?}")]
    InvalidUrl(String),
}
