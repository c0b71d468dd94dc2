use std::sync::Arc;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::AccountSettings,
    db::models::{Ledger, TransactionRecord},
};

/// Operator-visible sync health of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    /// Too many consecutive failed cycles
    Degraded,
}

/// Live state of one tracked address.
///
/// Owned exclusively by that address's sync loop; everyone else reads
/// [`AccountSnapshot`]s.
#[derive(Debug, Clone)]
pub struct AccountState {
    pub address: String,
    pub key_ref: Option<String>,
    pub color: u32,
    pub ledger: Ledger,
    /// Next unscanned block boundary
    pub from_block: u64,
    pub balance: U256,
    /// One entry per tracked token, in token order. Empty until first resolved.
    pub balances: Vec<U256>,
    pub loading: bool,
    pub notifications: u64,
    pub consecutive_failures: u32,
    pub health: Health,
}

impl AccountState {
    /// Fresh state for an address with no stored snapshot.
    pub fn new(settings: &AccountSettings, genesis_block: u64) -> Self {
        Self {
            address: settings.address.clone(),
            key_ref: settings.key_ref.clone(),
            color: settings.color,
            ledger: Ledger::new(),
            from_block: genesis_block,
            balance: U256::ZERO,
            balances: Vec::new(),
            loading: true,
            notifications: 0,
            consecutive_failures: 0,
            health: Health::Healthy,
        }
    }

    /// State restored from a stored snapshot, or fresh defaults.
    pub fn restore(
        settings: &AccountSettings,
        genesis_block: u64,
        stored: Option<StoredAccount>,
    ) -> Self {
        let mut state = Self::new(settings, genesis_block);

        if let Some(stored) = stored {
            state.from_block = stored.from_block;
            state.balance = stored.balance;
            state.loading = stored.loading;
            state.ledger = Ledger::from_records(stored.transactions);
        }

        state
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            address: self.address.clone(),
            key_ref: self.key_ref.clone(),
            color: self.color,
            transactions: self.ledger.snapshot(),
            from_block: self.from_block,
            balance: self.balance,
            balances: self.balances.clone(),
            loading: self.loading,
            notifications: self.notifications,
            consecutive_failures: self.consecutive_failures,
            health: self.health,
            updated_at: Utc::now(),
        }
    }

    pub fn to_stored(&self) -> StoredAccount {
        StoredAccount {
            address: self.address.clone(),
            from_block: self.from_block,
            balance: self.balance,
            loading: self.loading,
            transactions: self.ledger.records().to_vec(),
            saved_at: Utc::now(),
        }
    }
}

/// Immutable view of an account handed to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub address: String,
    pub key_ref: Option<String>,
    pub color: u32,
    pub transactions: Arc<[TransactionRecord]>,
    pub from_block: u64,
    pub balance: U256,
    pub balances: Vec<U256>,
    pub loading: bool,
    pub notifications: u64,
    pub consecutive_failures: u32,
    pub health: Health,
    pub updated_at: DateTime<Utc>,
}

/// Persisted form of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    pub address: String,
    pub from_block: u64,
    pub balance: U256,
    pub loading: bool,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{tx, ALICE, BOB};

    fn settings() -> AccountSettings {
        AccountSettings {
            address: ALICE.to_string(),
            key_ref: Some("keystore:alice".to_string()),
            color: 3,
            tokens: Vec::new(),
        }
    }

    #[test]
    fn test_new_uses_defaults() {
        let state = AccountState::new(&settings(), 1_000);

        assert_eq!(state.from_block, 1_000);
        assert_eq!(state.balance, U256::ZERO);
        assert!(state.loading);
        assert!(state.ledger.is_empty());
        assert_eq!(state.health, Health::Healthy);
    }

    #[test]
    fn test_restore_round_trips_stored_fields() {
        let mut original = AccountState::new(&settings(), 0);
        original.ledger.upsert(tx("0x01", ALICE, BOB));
        original.from_block = 250;
        original.balance = U256::from(99u64);
        original.loading = false;

        let restored = AccountState::restore(&settings(), 0, Some(original.to_stored()));

        assert_eq!(restored.from_block, 250);
        assert_eq!(restored.balance, U256::from(99u64));
        assert!(!restored.loading);
        assert_eq!(restored.ledger.size(), 1);
        // Notifications are per-process, not persisted
        assert_eq!(restored.notifications, 0);
    }

    #[test]
    fn test_restore_without_snapshot_starts_at_genesis() {
        let state = AccountState::restore(&settings(), 77, None);
        assert_eq!(state.from_block, 77);
        assert!(state.loading);
    }
}
