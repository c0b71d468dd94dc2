use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainClient,
    config::SyncSettings,
    db::{
        models::{AccountSnapshot, AccountState, Health, Upsert},
        SnapshotStore,
    },
    error::FetchError,
    utils::short_id,
    worker::{
        balances::{BalanceResolver, BalanceSet},
        fetcher::BatchBlockFetcher,
        filter::filter_transactions,
    },
};

/// Result of one successful sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No new blocks since the cursor
    UpToDate { head: u64 },
    /// Node reports a head below the cursor; nothing scanned, cursor kept
    Behind { head: u64 },
    Synced {
        head: u64,
        matched: usize,
        inserted: usize,
    },
}

/// Sync loop for a single tracked address.
///
/// Each cycle reads the chain head, scans `[from_block, head]` through the shared
/// fetcher, merges matching transactions into the ledger, resolves balances when
/// anything matched, advances the cursor to that head, persists and publishes.
/// A failed cycle leaves the cursor where it was and is retried after a delay.
/// Cycles never overlap: the next one starts only after the previous one scheduled it.
pub struct AccountWorker<C, S> {
    state: AccountState,
    tokens: Vec<String>,
    client: Arc<C>,
    fetcher: Arc<BatchBlockFetcher<C>>,
    balances: BalanceResolver<C>,
    store: Arc<S>,
    settings: SyncSettings,
    publisher: watch::Sender<Arc<AccountSnapshot>>,
    tag: String,
}

impl<C: ChainClient, S: SnapshotStore> AccountWorker<C, S> {
    pub fn new(
        state: AccountState,
        tokens: Vec<String>,
        client: Arc<C>,
        fetcher: Arc<BatchBlockFetcher<C>>,
        store: Arc<S>,
        settings: SyncSettings,
    ) -> (Self, watch::Receiver<Arc<AccountSnapshot>>) {
        let (publisher, receiver) = watch::channel(Arc::new(state.snapshot()));
        let tag = short_id(&state.address);

        let worker = Self {
            state,
            tokens,
            balances: BalanceResolver::new(client.clone()),
            client,
            fetcher,
            store,
            settings,
            publisher,
            tag,
        };

        (worker, receiver)
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// One scan-merge-resolve pass. On error nothing in the state has changed.
    pub async fn sync_once(&mut self) -> Result<CycleOutcome, FetchError> {
        let from_block = self.state.from_block;

        // The cycle is anchored to this head even if the chain moves meanwhile
        let head = self.client.block_number().await.map_err(FetchError::Head)?;

        if head == from_block {
            return Ok(CycleOutcome::UpToDate { head });
        }

        if head < from_block {
            debug!(
                "[{}] Node head {} is below cursor {}, waiting",
                self.tag, head, from_block
            );
            return Ok(CycleOutcome::Behind { head });
        }

        let blocks = self.fetcher.fetch(from_block, head).await?;
        let transactions = filter_transactions(&blocks, &self.state.address);

        let matched = transactions.len();
        let mut inserted = 0;
        for tx in transactions {
            if self.state.ledger.upsert(tx) == Upsert::Inserted {
                inserted += 1;
            }
        }

        if matched > 0 {
            self.state.loading = false;
            self.state.notifications += matched as u64;

            info!(
                "[{}] Merged {} transaction(s) ({} new) from blocks [{}, {}]",
                self.tag, matched, inserted, from_block, head
            );

            self.resolve_balances().await;
        }

        self.state.from_block = head;

        Ok(CycleOutcome::Synced {
            head,
            matched,
            inserted,
        })
    }

    /// Query token balances and apply whatever resolved.
    pub async fn resolve_balances(&mut self) {
        let BalanceSet { primary, auxiliary } = self
            .balances
            .resolve(&self.state.address, &self.tokens)
            .await;

        if let Some(balance) = primary {
            self.state.balance = balance;
        }
        if let Some(balances) = auxiliary {
            self.state.balances = balances;
        }
    }

    /// Delay before retrying after `failures` consecutive failed cycles.
    ///
    /// Doubles from the poll interval and is capped at the larger of the poll
    /// interval and the configured maximum.
    pub fn retry_delay(&self, failures: u32) -> Duration {
        let base = self.settings.poll_interval();
        let cap = self.settings.max_retry_delay().max(base);
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);

        base.saturating_mul(factor).min(cap)
    }

    /// Run one cycle with its bookkeeping and return the delay until the next one.
    pub async fn run_cycle(&mut self) -> Duration {
        let delay = match self.sync_once().await {
            Ok(_) => {
                if self.state.consecutive_failures > 0 {
                    info!(
                        "[{}] Sync recovered after {} failed cycle(s)",
                        self.tag, self.state.consecutive_failures
                    );
                }
                self.state.consecutive_failures = 0;
                self.state.health = Health::Healthy;

                self.persist().await;
                self.settings.poll_interval()
            },
            Err(e) => {
                self.state.consecutive_failures += 1;
                let failures = self.state.consecutive_failures;

                if failures >= self.settings.failure_threshold {
                    if self.state.health != Health::Degraded {
                        error!(
                            "[{}] Sync degraded: {} consecutive failures, cursor stuck at {}",
                            self.tag, failures, self.state.from_block
                        );
                    }
                    self.state.health = Health::Degraded;
                }

                let delay = self.retry_delay(failures);
                warn!(
                    "[{}] Sync cycle from block {} failed: {}. Retrying in {:?}",
                    self.tag, self.state.from_block, e, delay
                );
                delay
            },
        };

        self.publish();
        delay
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.state.to_stored()).await {
            warn!("[{}] Failed to persist snapshot: {}", self.tag, e);
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(Arc::new(self.state.snapshot()));
    }

    /// Run until `cancellation_token` fires. Cancellation is observed between
    /// cycles, never in the middle of one.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        info!(
            "[{}] Sync loop starting at block {} ({} transaction(s) restored)",
            self.tag,
            self.state.from_block,
            self.state.ledger.size()
        );

        self.resolve_balances().await;
        self.publish();

        loop {
            if cancellation_token.is_cancelled() {
                break;
            }

            let delay = self.run_cycle().await;

            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {},
            }
        }

        info!(
            "[{}] Sync loop stopped at block {}",
            self.tag, self.state.from_block
        );
    }
}
