use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{chain::RawTransaction, db::models::TransactionRecord};

/// Outcome of [`Ledger::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Insertion-ordered, hash-unique transaction history for one address.
///
/// Records keep their first-seen position; the hash index gives O(1) lookups.
/// Mutation needs `&mut self`, so readers only ever see whole records through
/// [`Ledger::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<TransactionRecord>,
    index: FxHashMap<String, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records. Duplicate hashes collapse onto the first position.
    pub fn from_records(records: impl IntoIterator<Item = TransactionRecord>) -> Self {
        let mut ledger = Self::new();
        for mut record in records {
            record.transaction_hash = record.transaction_hash.to_lowercase();
            match ledger.index.get(&record.transaction_hash) {
                Some(&i) => ledger.records[i] = record,
                None => {
                    ledger
                        .index
                        .insert(record.transaction_hash.clone(), ledger.records.len());
                    ledger.records.push(record);
                },
            }
        }
        ledger
    }

    pub fn upsert(&mut self, raw: RawTransaction) -> Upsert {
        let key = raw.hash.to_lowercase();

        if let Some(&i) = self.index.get(&key) {
            self.records[i].update(raw);
            return Upsert::Updated;
        }

        self.index.insert(key, self.records.len());
        self.records.push(TransactionRecord::new(raw));
        Upsert::Inserted
    }

    pub fn get(&self, hash: &str) -> Option<&TransactionRecord> {
        self.index
            .get(&hash.to_lowercase())
            .map(|&i| &self.records[i])
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Immutable copy for readers.
    pub fn snapshot(&self) -> Arc<[TransactionRecord]> {
        Arc::from(self.records.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::chain::testing::{tx, ALICE, BOB, CAROL};

    #[test]
    fn test_upsert_appends_in_first_seen_order() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.upsert(tx("0x01", ALICE, BOB)), Upsert::Inserted);
        assert_eq!(ledger.upsert(tx("0x02", BOB, ALICE)), Upsert::Inserted);
        assert_eq!(ledger.upsert(tx("0x03", ALICE, CAROL)), Upsert::Inserted);

        let hashes: Vec<_> = ledger
            .snapshot()
            .iter()
            .map(|r| r.transaction_hash.clone())
            .collect();
        assert_eq!(hashes, vec!["0x01", "0x02", "0x03"]);
    }

    #[test]
    fn test_upsert_same_hash_updates_in_place() {
        let mut ledger = Ledger::new();
        ledger.upsert(tx("0x01", ALICE, BOB));
        ledger.upsert(tx("0x02", BOB, ALICE));

        let mut confirmed = tx("0x01", ALICE, BOB);
        confirmed.block_number = Some(42);
        confirmed.value = U256::from(7u64);

        assert_eq!(ledger.upsert(confirmed), Upsert::Updated);
        assert_eq!(ledger.size(), 2);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot[0].transaction_hash, "0x01");
        assert_eq!(snapshot[0].transaction.block_number, Some(42));
        assert_eq!(snapshot[0].transaction.value, U256::from(7u64));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.upsert(tx("0xAB", ALICE, BOB));
        ledger.upsert(tx("0xab", ALICE, BOB));
        ledger.upsert(tx("0xab", ALICE, BOB));

        assert_eq!(ledger.size(), 1);
        assert!(ledger.get("0xAB").is_some());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_updates() {
        let mut ledger = Ledger::new();
        ledger.upsert(tx("0x01", ALICE, BOB));
        let before = ledger.snapshot();

        ledger.upsert(tx("0x02", ALICE, BOB));

        assert_eq!(before.len(), 1);
        assert_eq!(ledger.size(), 2);
    }

    #[test]
    fn test_from_records_collapses_duplicates() {
        let first = TransactionRecord::new(tx("0x01", ALICE, BOB));
        let second = TransactionRecord::new(tx("0x02", ALICE, BOB));
        let mut replacement = TransactionRecord::new(tx("0x01", ALICE, CAROL));
        replacement.transaction.nonce = 9;

        let ledger = Ledger::from_records(vec![first, second, replacement]);

        assert_eq!(ledger.size(), 2);
        assert_eq!(ledger.records()[0].transaction.nonce, 9);
        assert_eq!(ledger.records()[1].transaction_hash, "0x02");
    }

    #[test]
    fn test_restored_mixed_case_hash_is_updated_not_duplicated() {
        let mut stored = TransactionRecord::new(tx("0x01", ALICE, BOB));
        stored.transaction_hash = "0xABCD".to_string();

        let mut ledger = Ledger::from_records(vec![stored]);
        assert_eq!(ledger.records()[0].transaction_hash, "0xabcd");

        assert_eq!(ledger.upsert(tx("0xabcd", ALICE, BOB)), Upsert::Updated);
        assert_eq!(ledger.size(), 1);
        assert!(ledger.get("0xAbCd").is_some());
    }
}
