//! LRU cache of decoded source tiles.
//!
//! Neighbouring Deep Zoom tiles overlap the same native tiles, and every
//! coarser Deep Zoom level re-reads native tiles that finer levels already
//! decoded. Keeping decoded tiles for the length of a run avoids most of the
//! repeated JPEG decoding.
//!
//! Capacity is counted in tiles, not bytes: native tiles are uniformly sized
//! within a slide.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbImage;
use lru::LruCache;
use tokio::sync::Mutex;

/// Decoded tiles kept by default; 256 tiles of 256x256 RGB is about 48 MiB.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 256;

// =============================================================================
// Cache Key
// =============================================================================

/// A native tile: slide level plus tile column and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub level: usize,
    pub tile_x: u32,
    pub tile_y: u32,
}

impl TileCacheKey {
    pub fn new(level: usize, tile_x: u32, tile_y: u32) -> Self {
        Self {
            level,
            tile_x,
            tile_y,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct TileCache {
    cache: Mutex<LruCache<TileCacheKey, Arc<RgbImage>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TileCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a tile, marking it most recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Arc<RgbImage>> {
        let found = self.cache.lock().await.get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub async fn put(&self, key: TileCacheKey, tile: Arc<RgbImage>) {
        self.cache.lock().await.put(key, tile);
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn capacity(&self) -> usize {
        self.cache.lock().await.cap().get()
    }

    pub fn stats(&self) -> TileCacheStats {
        TileCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
