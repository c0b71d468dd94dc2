//! In-memory [`ChainClient`] double for unit tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use alloy::primitives::U256;

use crate::{
    chain::{Block, ChainClient, RawTransaction},
    error::ChainError,
};

pub(crate) const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
pub(crate) const BOB: &str = "0xb0b0000000000000000000000000000000000002";
pub(crate) const CAROL: &str = "0xca20100000000000000000000000000000000003";
pub(crate) const TOKEN_A: &str = "0x7070000000000000000000000000000000000a0a";
pub(crate) const TOKEN_B: &str = "0x7070000000000000000000000000000000000b0b";

pub(crate) fn tx(hash: &str, from: &str, to: &str) -> RawTransaction {
    RawTransaction {
        hash: hash.to_string(),
        from: from.to_string(),
        to: Some(to.to_string()),
        value: U256::ZERO,
        nonce: 0,
        block_number: None,
        transaction_index: None,
        input: Default::default(),
    }
}

#[derive(Default)]
pub(crate) struct MockChain {
    head: AtomicU64,
    blocks: Mutex<BTreeMap<u64, Block>>,
    balances: Mutex<HashMap<String, U256>>,
    failing_balances: Mutex<Vec<String>>,
    fail_head: AtomicBool,
    fail_blocks: AtomicBool,
    batch_delay: Mutex<Option<Duration>>,
    head_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    requested: Mutex<Vec<Vec<u64>>>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Inserts every block in `range` with no transactions, keeping existing ones.
    pub(crate) fn fill_empty(&self, range: std::ops::RangeInclusive<u64>) {
        let mut blocks = self.blocks.lock().unwrap();
        for number in range {
            blocks.entry(number).or_insert(Block {
                number,
                transactions: Some(Vec::new()),
            });
        }
    }

    pub(crate) fn put_block(&self, number: u64, transactions: Vec<RawTransaction>) {
        self.blocks.lock().unwrap().insert(
            number,
            Block {
                number,
                transactions: Some(transactions),
            },
        );
    }

    /// Serves `block` when `number` is requested, whatever its own number says.
    pub(crate) fn serve_as(&self, number: u64, block: Block) {
        self.blocks.lock().unwrap().insert(number, block);
    }

    pub(crate) fn remove_block(&self, number: u64) {
        self.blocks.lock().unwrap().remove(&number);
    }

    pub(crate) fn set_balance(&self, contract: &str, value: U256) {
        self.balances
            .lock()
            .unwrap()
            .insert(contract.to_lowercase(), value);
    }

    pub(crate) fn fail_balance(&self, contract: &str) {
        self.failing_balances
            .lock()
            .unwrap()
            .push(contract.to_lowercase());
    }

    pub(crate) fn set_fail_head(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_blocks(&self, fail: bool) {
        self.fail_blocks.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_batch_delay(&self, delay: Duration) {
        *self.batch_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<Vec<u64>> {
        self.requested.lock().unwrap().clone()
    }
}

impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_head.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("head unavailable".to_string()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_blocks(&self, numbers: &[u64]) -> Result<Vec<Option<Block>>, ChainError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(numbers.to_vec());

        let delay = *self.batch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("batch rejected".to_string()));
        }

        let blocks = self.blocks.lock().unwrap();
        Ok(numbers.iter().map(|n| blocks.get(n).cloned()).collect())
    }

    async fn balance_of(&self, contract: &str, _owner: &str) -> Result<U256, ChainError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);

        let contract = contract.to_lowercase();
        if self.failing_balances.lock().unwrap().contains(&contract) {
            return Err(ChainError::Rpc("execution reverted".to_string()));
        }

        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&contract)
            .copied()
            .unwrap_or_default())
    }
}
