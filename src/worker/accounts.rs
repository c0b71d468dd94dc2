use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{error, info, warn};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainClient,
    config::{AccountSettings, ChainSettings, SyncSettings},
    db::{
        models::{AccountSnapshot, AccountState, Health},
        SnapshotStore,
    },
    utils::short_id,
    worker::{fetcher::BatchBlockFetcher, AccountWorker},
};

/// How long a stopping loop gets to finish its current cycle
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between status summaries in the log
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Read-only access to one account's published snapshots.
#[derive(Clone)]
pub struct AccountHandle {
    pub address: String,
    receiver: watch::Receiver<Arc<AccountSnapshot>>,
}

impl AccountHandle {
    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<AccountSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Receiver that wakes on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AccountSnapshot>> {
        self.receiver.clone()
    }
}

/// Represents a running account sync loop
struct RunningAccount {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    receiver: watch::Receiver<Arc<AccountSnapshot>>,
}

/// Owns one sync loop per tracked address.
///
/// All loops share a single chain client and block fetcher, so identical ranges
/// scanned by several accounts cost one batched fetch. Each loop runs under a
/// child of the manager's cancellation token.
pub struct AccountManager<C, S> {
    running: HashMap<String, RunningAccount>,
    client: Arc<C>,
    fetcher: Arc<BatchBlockFetcher<C>>,
    store: Arc<S>,
    genesis_block: u64,
    sync: SyncSettings,
    cancellation_token: CancellationToken,
}

impl<C: ChainClient, S: SnapshotStore> AccountManager<C, S> {
    pub fn new(
        client: Arc<C>,
        store: Arc<S>,
        chain: &ChainSettings,
        sync: SyncSettings,
        cancellation_token: CancellationToken,
    ) -> Self {
        let fetcher = Arc::new(BatchBlockFetcher::new(
            client.clone(),
            chain.max_batch_size,
            sync.block_cache_capacity,
            Duration::from_secs(sync.block_cache_ttl_seconds),
        ));

        Self {
            running: HashMap::new(),
            client,
            fetcher,
            store,
            genesis_block: chain.genesis_block,
            sync,
            cancellation_token,
        }
    }

    /// Restore an account from the store (or defaults) and spawn its loop.
    ///
    /// Returns None if the address is already running.
    pub async fn start_account(&mut self, account: AccountSettings) -> Option<AccountHandle> {
        let address = account.address.to_lowercase();
        let tag = short_id(&address);

        if self.running.contains_key(&address) {
            warn!("[{}] Account is already running, skipping", tag);
            return None;
        }

        let stored = match self.store.load(&address).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    "[{}] Failed to load stored snapshot: {}. Starting from block {}",
                    tag, e, self.genesis_block
                );
                None
            },
        };

        let state = AccountState::restore(&account, self.genesis_block, stored);

        let (worker, receiver) = AccountWorker::new(
            state,
            account.tokens.clone(),
            self.client.clone(),
            self.fetcher.clone(),
            self.store.clone(),
            self.sync.clone(),
        );

        let cancel_token = self.cancellation_token.child_token();
        let handle = tokio::spawn(worker.run(cancel_token.clone()));

        self.running.insert(
            address.clone(),
            RunningAccount {
                handle,
                cancel_token,
                receiver: receiver.clone(),
            },
        );

        info!("[{}] Account sync started", tag);

        Some(AccountHandle { address, receiver })
    }

    /// Start every configured account, skipping duplicates.
    pub async fn start_all(&mut self, accounts: &[AccountSettings]) -> Vec<AccountHandle> {
        let mut handles = Vec::with_capacity(accounts.len());
        for account in accounts {
            if let Some(handle) = self.start_account(account.clone()).await {
                handles.push(handle);
            }
        }
        handles
    }

    pub fn handle(&self, address: &str) -> Option<AccountHandle> {
        let address = address.to_lowercase();
        self.running.get(&address).map(|running| AccountHandle {
            address,
            receiver: running.receiver.clone(),
        })
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Stop an account loop gracefully
    pub async fn stop_account(&mut self, address: &str) {
        let tag = short_id(address);

        let Some(running) = self.running.remove(&address.to_lowercase()) else {
            warn!("[{}] Attempted to stop account but it was not running", tag);
            return;
        };

        running.cancel_token.cancel();

        match tokio::time::timeout(STOP_TIMEOUT, running.handle).await {
            Ok(Ok(())) => info!("[{}] Account sync stopped gracefully", tag),
            Ok(Err(e)) => error!("[{}] Account sync task failed: {}", tag, e),
            Err(_) => warn!(
                "[{}] Account sync did not stop within {:?}, continuing...",
                tag, STOP_TIMEOUT
            ),
        }
    }

    fn log_status(&mut self) {
        // A loop only ends on its own if it panicked
        let finished: Vec<String> = self
            .running
            .iter()
            .filter(|(_, running)| running.handle.is_finished())
            .map(|(address, _)| address.clone())
            .collect();

        for address in finished {
            error!("[{}] Account sync loop exited unexpectedly", short_id(&address));
            self.running.remove(&address);
        }

        let degraded = self
            .running
            .values()
            .filter(|running| running.receiver.borrow().health == Health::Degraded)
            .count();

        if degraded > 0 {
            warn!(
                "AccountManager: {} of {} account(s) degraded",
                degraded,
                self.running.len()
            );
        } else {
            info!("AccountManager: {} account(s) syncing", self.running.len());
        }
    }

    /// Run until the manager's cancellation token fires, then stop every loop.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("AccountManager: Received cancellation signal");
                    break;
                }
                _ = tokio::time::sleep(STATUS_LOG_INTERVAL) => self.log_status(),
            }
        }

        info!("AccountManager: Stopping all account loops...");
        let addresses: Vec<String> = self.running.keys().cloned().collect();
        for address in addresses {
            self.stop_account(&address).await;
        }

        info!("AccountManager: Shutdown complete");
    }
}
