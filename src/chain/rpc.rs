use std::{future::IntoFuture, time::Duration};

use alloy::{
    consensus::Transaction as ConsensusTransaction,
    eips::BlockNumberOrTag,
    network::TransactionResponse,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::BatchRequest,
    rpc::types::{Block as RpcBlock, Transaction as RpcTransaction},
};
use log::debug;
use url::Url;

use crate::{
    abis::IERC20,
    chain::{Block, ChainClient, RawTransaction},
    error::ChainError,
    utils::hex_encode,
};

/// [`ChainClient`] over an HTTP JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| ChainError::InvalidInput(format!("rpc url {rpc_url:?}: {e}")))?;

        let client = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            provider: DynProvider::new(client),
            timeout,
        })
    }

    async fn with_timeout<T, E, F>(&self, fut: F) -> Result<T, ChainError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        ChainError: From<E>,
    {
        let result = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?;

        Ok(result?)
    }

    /// One JSON-RPC batch of `eth_getBlockByNumber(n, true)`, one entry per number.
    async fn fetch_batch(&self, numbers: &[u64]) -> Result<Vec<Option<Block>>, ChainError> {
        let mut batch = BatchRequest::new(self.provider.client());

        let mut waiters = Vec::with_capacity(numbers.len());
        for &number in numbers {
            let waiter = batch.add_call::<_, Option<RpcBlock>>(
                "eth_getBlockByNumber",
                &(BlockNumberOrTag::Number(number), true),
            )?;
            waiters.push(waiter);
        }

        batch.send().await?;

        // Waiters resolve in any order; try_join_all keeps request order
        let blocks = futures::future::try_join_all(waiters).await?;

        debug!(
            "Batch of {} block requests returned {} blocks",
            numbers.len(),
            blocks.iter().filter(|b| b.is_some()).count()
        );

        Ok(blocks.into_iter().map(|b| b.map(local_block)).collect())
    }
}

fn parse_address(value: &str) -> Result<Address, ChainError> {
    value
        .parse()
        .map_err(|_| ChainError::InvalidInput(format!("address {value:?}")))
}

fn raw_transaction(tx: &RpcTransaction) -> RawTransaction {
    RawTransaction {
        hash: hex_encode(TransactionResponse::tx_hash(tx).as_slice()),
        from: hex_encode(TransactionResponse::from(tx).as_slice()),
        to: ConsensusTransaction::to(tx).map(|to| hex_encode(to.as_slice())),
        value: ConsensusTransaction::value(tx),
        nonce: ConsensusTransaction::nonce(tx),
        block_number: TransactionResponse::block_number(tx),
        transaction_index: TransactionResponse::transaction_index(tx),
        input: ConsensusTransaction::input(tx).clone(),
    }
}

fn local_block(block: RpcBlock) -> Block {
    let transactions = block
        .transactions
        .as_transactions()
        .map(|txs| txs.iter().map(raw_transaction).collect());

    Block {
        number: block.header.number,
        transactions,
    }
}

impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.with_timeout(self.provider.get_block_number()).await
    }

    async fn get_blocks(&self, numbers: &[u64]) -> Result<Vec<Option<Block>>, ChainError> {
        self.with_timeout(self.fetch_batch(numbers)).await
    }

    async fn balance_of(&self, contract: &str, owner: &str) -> Result<U256, ChainError> {
        let contract = parse_address(contract)?;
        let owner = parse_address(owner)?;

        let token = IERC20::new(contract, &self.provider);
        let call = token.balanceOf(owner);

        self.with_timeout(call.call()).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    const TX_HASH: &str = "0xAB00000000000000000000000000000000000000000000000000000000000001";
    const SENDER: &str = "0xA11CE00000000000000000000000000000000001";

    fn zeros(bytes: usize) -> String {
        format!("0x{}", "00".repeat(bytes))
    }

    fn rpc_block(transactions: Value) -> RpcBlock {
        serde_json::from_value(json!({
            "hash": zeros(32),
            "parentHash": zeros(32),
            "sha3Uncles": zeros(32),
            "miner": zeros(20),
            "stateRoot": zeros(32),
            "transactionsRoot": zeros(32),
            "receiptsRoot": zeros(32),
            "logsBloom": zeros(256),
            "difficulty": "0x0",
            "number": "0x1",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x5208",
            "timestamp": "0x6553f100",
            "extraData": "0x",
            "mixHash": zeros(32),
            "nonce": zeros(8),
            "baseFeePerGas": "0x7",
            "uncles": [],
            "transactions": transactions,
        }))
        .unwrap()
    }

    fn contract_creation() -> Value {
        json!({
            "type": "0x2",
            "chainId": "0x1",
            "hash": TX_HASH,
            "nonce": "0x3",
            "blockHash": zeros(32),
            "blockNumber": "0x1",
            "transactionIndex": "0x0",
            "from": SENDER,
            "to": null,
            "value": "0x2a",
            "gas": "0x5208",
            "maxFeePerGas": "0x10",
            "maxPriorityFeePerGas": "0x1",
            "accessList": [],
            "input": "0x6080",
            "v": "0x0",
            "yParity": "0x0",
            "r": "0x1",
            "s": "0x1",
        })
    }

    #[test]
    fn test_full_block_maps_to_raw_transactions() {
        let block = local_block(rpc_block(json!([contract_creation()])));

        assert_eq!(block.number, 1);
        let transactions = block.transactions.unwrap();
        assert_eq!(transactions.len(), 1);

        let tx = &transactions[0];
        assert_eq!(tx.hash, TX_HASH.to_lowercase());
        assert_eq!(tx.from, SENDER.to_lowercase());
        assert_eq!(tx.to, None);
        assert_eq!(tx.value, U256::from(42u64));
        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.block_number, Some(1));
        assert_eq!(tx.transaction_index, Some(0));
        assert_eq!(tx.input.to_vec(), vec![0x60u8, 0x80]);
    }

    #[test]
    fn test_hash_only_block_has_no_bodies() {
        let block = local_block(rpc_block(json!([TX_HASH])));

        assert_eq!(block.number, 1);
        assert!(block.transactions.is_none());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = parse_address("0x1234").unwrap_err();
        assert!(matches!(err, ChainError::InvalidInput(_)));
    }
}
