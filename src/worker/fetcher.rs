use std::{sync::Arc, time::Duration};

use log::debug;
use moka::future::Cache;

use crate::{
    chain::{Block, ChainClient},
    error::{ChainError, FetchError},
};

/// Blocks of an inclusive range; slot `i` holds block `from_block + i`.
/// A slot is None when the node did not know that block.
pub type BlockBatch = Arc<[Option<Block>]>;

/// Fetches inclusive block ranges as batched RPC round trips.
///
/// Shared process-wide by every account loop. Requests are coalesced per exact
/// `(from_block, to_block)` key: concurrent callers of the same range share one
/// in-flight fetch, and a completed range is reused until it expires. Failures
/// are never cached and never retried here.
pub struct BatchBlockFetcher<C> {
    client: Arc<C>,
    max_batch_size: usize,
    ranges: Cache<(u64, u64), BlockBatch>,
}

impl<C: ChainClient> BatchBlockFetcher<C> {
    pub fn new(client: Arc<C>, max_batch_size: usize, capacity: u64, ttl: Duration) -> Self {
        let ranges = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            client,
            max_batch_size: max_batch_size.max(1),
            ranges,
        }
    }

    /// Fetch `[from_block, to_block]`; returns exactly `to_block - from_block + 1` slots.
    pub async fn fetch(&self, from_block: u64, to_block: u64) -> Result<BlockBatch, FetchError> {
        if from_block > to_block {
            return Err(FetchError::InvalidRange {
                from_block,
                to_block,
            });
        }

        self.ranges
            .try_get_with(
                (from_block, to_block),
                self.fetch_uncached(from_block, to_block),
            )
            .await
            .map_err(|e| (*e).clone())
    }

    async fn fetch_uncached(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<BlockBatch, FetchError> {
        let numbers: Vec<u64> = (from_block..=to_block).collect();
        let mut blocks: Vec<Option<Block>> = Vec::with_capacity(numbers.len());

        let chain_error = |source| FetchError::Chain {
            from_block,
            to_block,
            source,
        };

        // Fewest round trips the node's batch limit allows
        for chunk in numbers.chunks(self.max_batch_size) {
            let fetched = self.client.get_blocks(chunk).await.map_err(chain_error)?;

            if fetched.len() != chunk.len() {
                return Err(chain_error(ChainError::ShortBatch {
                    expected: chunk.len(),
                    got: fetched.len(),
                }));
            }

            for (&expected, block) in chunk.iter().zip(fetched) {
                if let Some(got) = block.as_ref().map(|b| b.number) {
                    if got != expected {
                        return Err(FetchError::Malformed { expected, got });
                    }
                }
                blocks.push(block);
            }
        }

        debug!(
            "Fetched blocks [{}, {}] in {} round trip(s)",
            from_block,
            to_block,
            numbers.len().div_ceil(self.max_batch_size)
        );

        Ok(blocks.into())
    }
}
