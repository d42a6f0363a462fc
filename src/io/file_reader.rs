use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// RangeReader over a file on the local filesystem.
///
/// Reads seek and fill under a lock, so one reader can be shared by
/// reference across the parser and tile readers.
pub struct LocalFileReader {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open a file and record its size.
    ///
    /// A missing path maps to [`IoError::NotFound`], anything else (including
    /// the path being a directory) to [`IoError::Read`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let file = File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IoError::NotFound(display.clone()),
            _ => IoError::Read(format!("{}: {}", display, e)),
        })?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| IoError::Read(format!("{}: {}", display, e)))?;

        if metadata.is_dir() {
            return Err(IoError::Read(format!("{} is a directory", display)));
        }

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            size: metadata.len(),
            identifier: format!("file://{}", display),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset.saturating_add(len as u64) > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IoError::Read(format!("{}: seek to {}: {}", self.identifier, offset, e)))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| IoError::Read(format!("{}: {}", self.identifier, e)))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
