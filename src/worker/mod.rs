pub mod accounts;
pub mod balances;
pub mod fetcher;
pub mod filter;
pub mod worker;

pub use accounts::{AccountHandle, AccountManager};
pub use balances::{BalanceResolver, BalanceSet};
pub use fetcher::{BatchBlockFetcher, BlockBatch};
pub use filter::{filter_transactions, touches};
pub use worker::{AccountWorker, CycleOutcome};
