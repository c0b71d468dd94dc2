//! Chain RPC boundary.
//!
//! Everything the sync engine needs from a node goes through [`ChainClient`], which
//! is injected as an `Arc` into each component so tests can swap in a double.

use std::future::Future;

use alloy::primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

mod rpc;
#[cfg(test)]
pub(crate) mod testing;

pub use rpc::RpcChainClient;

/// A chain transaction as delivered by the node. Immutable once fetched.
///
/// Addresses and hash are `0x`-prefixed hex strings in whatever case the source
/// produced; comparisons must be case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    /// None for contract creations
    pub to: Option<String>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_index: Option<u64>,
    #[serde(default)]
    pub input: Bytes,
}

/// A block with full transaction bodies.
///
/// `transactions` is None when the node answered with hashes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub transactions: Option<Vec<RawTransaction>>,
}

/// Read-only access to an Ethereum-compatible node.
pub trait ChainClient: Send + Sync + 'static {
    /// Highest block number the node currently knows.
    fn block_number(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Fetch the given blocks, with transactions, as a single batched round trip.
    ///
    /// The result has one slot per requested number, in request order. A slot is
    /// None when the node does not know the block.
    fn get_blocks(
        &self,
        numbers: &[u64],
    ) -> impl Future<Output = Result<Vec<Option<Block>>, ChainError>> + Send;

    /// ERC-20 `balanceOf(owner)` on `contract`.
    fn balance_of(
        &self,
        contract: &str,
        owner: &str,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;
}
