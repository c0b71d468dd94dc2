use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::RawTransaction;

/// Ledger entry for one transaction touching a tracked address.
///
/// Keyed by `transaction_hash` (lowercased). A later observation of the same hash
/// replaces the wrapped transaction in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_hash: String,
    pub transaction: RawTransaction,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(raw: RawTransaction) -> Self {
        let now = Utc::now();
        Self {
            // Always lowercase hashes for consistent lookups
            transaction_hash: raw.hash.to_lowercase(),
            transaction: raw,
            first_seen_at: now,
            updated_at: now,
        }
    }

    /// Overwrite with a later-observed version of the same transaction.
    pub fn update(&mut self, raw: RawTransaction) {
        self.transaction = raw;
        self.updated_at = Utc::now();
    }
}
