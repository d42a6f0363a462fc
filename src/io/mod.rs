mod block_cache;
mod file_reader;
mod range_reader;

pub use block_cache::{BlockCache, BlockCacheStats, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
pub use file_reader::LocalFileReader;
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};
