mod account;
mod ledger;
mod transaction;

pub use account::{AccountSnapshot, AccountState, Health, StoredAccount};
pub use ledger::{Ledger, Upsert};
pub use transaction::TransactionRecord;
