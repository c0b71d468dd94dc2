use std::sync::Arc;

use alloy::primitives::U256;
use log::warn;

use crate::{chain::ChainClient, error::BalanceQueryError, utils::short_id};

/// Outcome of one balance resolution. None means "unresolved this cycle; keep the
/// previous value".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSet {
    pub primary: Option<U256>,
    /// One entry per token, same order as the token list
    pub auxiliary: Option<Vec<U256>>,
}

/// Queries ERC-20 balances for an address.
///
/// The first token is the primary balance. Every token, primary included, gets an
/// auxiliary entry. Values stay `U256`, so nothing is truncated.
pub struct BalanceResolver<C> {
    client: Arc<C>,
}

impl<C: ChainClient> BalanceResolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    async fn query(&self, contract: &str, owner: &str) -> Result<U256, BalanceQueryError> {
        self.client
            .balance_of(contract, owner)
            .await
            .map_err(|source| BalanceQueryError {
                contract: contract.to_string(),
                owner: owner.to_string(),
                source,
            })
    }

    /// Primary balance, or Ok(None) when no token is tracked.
    pub async fn resolve_primary(
        &self,
        address: &str,
        contracts: &[String],
    ) -> Result<Option<U256>, BalanceQueryError> {
        match contracts.first() {
            Some(contract) => self.query(contract, address).await.map(Some),
            None => Ok(None),
        }
    }

    /// All token balances, queried concurrently. Fails as a set.
    pub async fn resolve_auxiliary(
        &self,
        address: &str,
        contracts: &[String],
    ) -> Result<Vec<U256>, BalanceQueryError> {
        let queries = contracts
            .iter()
            .map(|contract| self.query(contract, address));
        futures::future::try_join_all(queries).await
    }

    /// Resolve primary and auxiliary balances concurrently. Failures are logged and
    /// leave the corresponding field unresolved.
    pub async fn resolve(&self, address: &str, contracts: &[String]) -> BalanceSet {
        let (primary, auxiliary) = tokio::join!(
            self.resolve_primary(address, contracts),
            self.resolve_auxiliary(address, contracts)
        );

        let primary = primary.unwrap_or_else(|e| {
            warn!("[{}] Primary balance unresolved: {}", short_id(address), e);
            None
        });

        let auxiliary = auxiliary
            .map_err(|e| warn!("[{}] Token balances unresolved: {}", short_id(address), e))
            .ok();

        BalanceSet { primary, auxiliary }
    }
}
