use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// Default block size: 256KB
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Default cache capacity in number of blocks (25.6MB with default blocks).
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 100;

/// Block-based caching layer that wraps any RangeReader.
///
/// Opening a slide means walking the IFD chain and pulling tag arrays from
/// scattered offsets, many of them a few bytes long. Aligning every request
/// to fixed-size blocks turns those into a handful of large reads, and the
/// neighbouring tiles of a level usually land in the same blocks.
///
/// - Fixed-size blocks, LRU eviction
/// - Reads spanning several blocks are stitched together
/// - Hit/miss counters for debug logging
pub struct BlockCache<R> {
    inner: R,
    block_size: usize,
    cache: Mutex<LruCache<u64, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl<R: RangeReader> BlockCache<R> {
    /// Wrap a reader with the default block size and capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Wrap a reader with a custom block size and capacity (in blocks).
    ///
    /// A zero capacity or block size is bumped to one.
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn stats(&self) -> BlockCacheStats {
        BlockCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        if let Some(data) = self.cache.lock().await.get(&block_idx) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(data.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let data = self.fetch_block(block_idx).await?;
        self.cache.lock().await.put(block_idx, data.clone());
        Ok(data)
    }

    async fn fetch_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // The last block may be short
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = remaining.min(self.block_size as u64) as usize;
        self.inner.read_exact_at(offset, len).await
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

#[async_trait]
impl<R: RangeReader> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        if offset.saturating_add(len as u64) > size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block).await?;
            let block_offset = self.offset_within_block(offset);
            return Ok(block.slice(block_offset..block_offset + len));
        }

        let mut result = BytesMut::with_capacity(len);
        let mut remaining = len;
        let mut current_offset = offset;

        for block_idx in start_block..=end_block {
            let block = self.get_block(block_idx).await?;
            let block_offset = self.offset_within_block(current_offset);
            let take = (block.len() - block_offset).min(remaining);

            result.extend_from_slice(&block[block_offset..block_offset + take]);

            remaining -= take;
            current_offset += take as u64;
        }

        Ok(result.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
