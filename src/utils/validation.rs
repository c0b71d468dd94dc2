//! Address validation and normalisation.
//!
//! Addresses are compared case-insensitively everywhere. Internally they are
//! carried as lowercase `0x`-prefixed hex strings, the same form `hex_encode`
//! produces.

use alloy::primitives::Address;

use super::{conversion::hex_encode, ZERO_ADDRESS};

/// Parse a hex address (any case, with or without checksum) and return it
/// lowercased. Returns None for anything that is not 20 bytes of hex.
pub fn normalize_address(value: &str) -> Option<String> {
    let address: Address = value.trim().parse().ok()?;
    Some(hex_encode(address.as_slice()))
}

/// Case-insensitive address equality without allocating.
#[inline]
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// True for the all-zero address, which is never a valid tracked account.
pub fn is_zero_address(value: &str) -> bool {
    same_address(value, ZERO_ADDRESS)
}

/// Short identifier derived from an address: the six hex characters after `0x`.
///
/// Used to key snapshots and to tag log lines.
pub fn short_id(address: &str) -> String {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    hex.chars().take(6).collect::<String>().to_lowercase()
}
