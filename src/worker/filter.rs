use crate::{
    chain::{Block, RawTransaction},
    utils::same_address,
};

/// True when `address` is the sender or the recipient of `tx`, ignoring case.
pub fn touches(tx: &RawTransaction, address: &str) -> bool {
    same_address(&tx.from, address) || tx.to.as_deref().is_some_and(|to| same_address(to, address))
}

/// Transactions in `blocks` that touch `address`, in block order then in-block order.
///
/// Missing blocks and blocks without a transaction list are skipped.
pub fn filter_transactions(blocks: &[Option<Block>], address: &str) -> Vec<RawTransaction> {
    blocks
        .iter()
        .flatten()
        .filter_map(|block| block.transactions.as_ref())
        .flatten()
        .filter(|tx| touches(tx, address))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{tx, ALICE, BOB, CAROL};

    fn block(number: u64, transactions: Vec<RawTransaction>) -> Option<Block> {
        Some(Block {
            number,
            transactions: Some(transactions),
        })
    }

    #[test]
    fn test_matches_sender_or_recipient_case_insensitively() {
        let upper = ALICE.to_uppercase().replacen("0X", "0x", 1);
        let blocks = vec![block(
            1,
            vec![
                tx("0x01", &upper, BOB),
                tx("0x02", BOB, CAROL),
                tx("0x03", CAROL, &upper),
            ],
        )];

        let matched = filter_transactions(&blocks, ALICE);

        let hashes: Vec<_> = matched.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x01", "0x03"]);
    }

    #[test]
    fn test_preserves_block_then_intra_block_order() {
        let blocks = vec![
            block(1, vec![tx("0x01", ALICE, BOB), tx("0x02", BOB, ALICE)]),
            block(2, vec![tx("0x03", CAROL, BOB)]),
            block(3, vec![tx("0x04", ALICE, CAROL), tx("0x05", ALICE, ALICE)]),
        ];

        let hashes: Vec<_> = filter_transactions(&blocks, ALICE)
            .into_iter()
            .map(|t| t.hash)
            .collect();

        assert_eq!(hashes, vec!["0x01", "0x02", "0x04", "0x05"]);
    }

    #[test]
    fn test_skips_missing_blocks_and_hash_only_bodies() {
        let blocks = vec![
            None,
            Some(Block {
                number: 2,
                transactions: None,
            }),
            block(3, vec![tx("0x09", BOB, ALICE)]),
        ];

        assert_eq!(filter_transactions(&blocks, ALICE).len(), 1);
    }

    #[test]
    fn test_contract_creation_matches_on_sender_only() {
        let mut creation = tx("0x0a", ALICE, BOB);
        creation.to = None;

        assert!(touches(&creation, ALICE));
        assert!(!touches(&creation, BOB));
    }
}
