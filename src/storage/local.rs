//! Local filesystem marker store.
//!
//! One zero-byte file per listing ID under the root directory; the file's
//! modification time is the "first seen" timestamp. Presence is the only
//! data ever read back from a marker.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::MarkerStore;

/// Marker store backed by a directory of mtime-stamped files.
#[derive(Debug, Clone)]
pub struct LocalMarkerStore {
    root_dir: PathBuf,
}

impl LocalMarkerStore {
    /// Create a store rooted at the given directory.
    ///
    /// The directory is created on first use.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, id: u64) -> PathBuf {
        self.root_dir.join(id.to_string())
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await.map_err(|e| {
            AppError::cache(format!(
                "cannot create marker directory {}: {e}",
                self.root_dir.display()
            ))
        })
    }
}

#[async_trait]
impl MarkerStore for LocalMarkerStore {
    async fn purge_expired(&self, retention: Duration) -> Result<usize> {
        self.ensure_dir().await?;
        let now = SystemTime::now();
        let mut purged = 0;

        let mut entries = tokio::fs::read_dir(&self.root_dir)
            .await
            .map_err(|e| AppError::cache(format!("cannot list markers: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::cache(format!("cannot list markers: {e}")))?
        {
            let metadata = entry.metadata().await.map_err(|e| {
                AppError::cache(format!("cannot stat marker {:?}: {e}", entry.file_name()))
            })?;
            let modified = metadata.modified().map_err(|e| {
                AppError::cache(format!("no mtime for marker {:?}: {e}", entry.file_name()))
            })?;

            let expired = now
                .duration_since(modified)
                .map(|age| age > retention)
                .unwrap_or(false);
            if expired {
                tokio::fs::remove_file(entry.path()).await.map_err(|e| {
                    AppError::cache(format!(
                        "cannot remove marker {:?}: {e}",
                        entry.file_name()
                    ))
                })?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn contains(&self, id: u64) -> Result<bool> {
        match tokio::fs::metadata(self.path(id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::cache(format!("cannot stat marker {id}: {e}"))),
        }
    }

    async fn mark(&self, id: u64) -> Result<()> {
        self.ensure_dir().await?;
        tokio::fs::File::create(self.path(id))
            .await
            .map(|_| ())
            .map_err(|e| AppError::cache(format!("cannot create marker {id}: {e}")))
    }
}
