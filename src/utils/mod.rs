//! Utility functions for the wallet sync engine.
//!
//! - [`conversion`] - Type conversions (U256, f64, hex encoding)
//! - [`validation`] - Address normalisation and comparison

mod conversion;
mod validation;

// ============================================
// Common Constants
// ============================================

/// The Ethereum zero address (0x0000000000000000000000000000000000000000)
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ============================================
// Re-exports
// ============================================

pub use conversion::{hex_encode, u256_to_f64, u256_to_f64_safe};

pub use validation::{is_zero_address, normalize_address, same_address, short_id};
