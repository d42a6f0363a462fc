//! Command-line configuration for wsi-dzi.
//!
//! Two subcommands share the slide I/O options:
//!
//! - `convert <input_file> <output_dir> <output_name>` - one-shot conversion
//! - `serve` - HTTP upload-and-convert service
//!
//! # Environment Variables
//!
//! - `WSI_BLOCK_SIZE` - Block size in bytes for the block cache (default: 256KB)
//! - `WSI_CACHE_BLOCKS` - Max blocks held by the block cache (default: 100)
//! - `WSI_CACHE_TILES` - Max decoded source tiles held during a run (default: 256)
//! - `WSI_HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3001)
//! - `WSI_DATA_DIR` - Root for `uploads/` and `public/slides/` (default: .)
//! - `WSI_MAX_UPLOAD_SIZE` - Upload limit in bytes (default: 5GB)
//! - `WSI_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io::{DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
use crate::slide::SlideOptions;
use crate::tile::DEFAULT_TILE_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".";

/// Default upload limit (5GB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024 * 1024;

const MIN_BLOCK_SIZE: usize = 1024;
const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// wsi-dzi - Convert Whole Slide Images into Deep Zoom tile pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-dzi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert a slide into <output_dir>/<output_name>.dzi and its tiles.
    Convert(ConvertConfig),

    /// Run the upload-and-convert HTTP service.
    Serve(ServeConfig),
}

/// Slide I/O and cache sizing, shared by both subcommands.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CacheArgs {
    /// Block size in bytes for the block cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "WSI_BLOCK_SIZE")]
    pub block_size: usize,

    /// Maximum number of blocks held by the block cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY, env = "WSI_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Maximum number of decoded source tiles held during a conversion.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "WSI_CACHE_TILES")]
    pub cache_tiles: usize,
}

impl Default for CacheArgs {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_BLOCK_CACHE_CAPACITY,
            cache_tiles: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

impl CacheArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn slide_options(&self) -> SlideOptions {
        SlideOptions {
            block_size: self.block_size,
            cache_blocks: self.cache_blocks,
            cache_tiles: self.cache_tiles,
        }
    }
}

// =============================================================================
// Convert Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Slide to convert (.svs or pyramidal .tif/.tiff).
    pub input_file: PathBuf,

    /// Directory receiving the .dzi file and its _files directory.
    pub output_dir: PathBuf,

    /// Base name of the .dzi file and _files directory.
    pub output_name: String,

    #[command(flatten)]
    pub cache: CacheArgs,
}

impl ConvertConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()
    }

    pub fn slide_options(&self) -> SlideOptions {
        self.cache.slide_options()
    }
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WSI_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Directory holding `uploads/` and `public/slides/`.
    #[arg(long, default_value = DEFAULT_DATA_DIR, env = "WSI_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Maximum upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE, env = "WSI_MAX_UPLOAD_SIZE")]
    pub max_upload_size: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "WSI_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    #[command(flatten)]
    pub cache: CacheArgs,
}

impl ServeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_size == 0 {
            return Err("max_upload_size must be greater than 0".to_string());
        }
        self.cache.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where converted slides are written and served from.
    pub fn slides_dir(&self) -> PathBuf {
        self.data_dir.join("public").join("slides")
    }

    /// Where uploads are staged until converted.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Upload limit for the body-limit layer, saturating on 32-bit targets.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_size).unwrap_or(usize::MAX)
    }

    pub fn slide_options(&self) -> SlideOptions {
        self.cache.slide_options()
    }
}

// =============================================================================
// Tests
// =============================================================================
