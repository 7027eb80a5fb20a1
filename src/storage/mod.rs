//! On-disk layout for filter content
//!
//! One file per id at `<dir>/<id>.<ext>`. Canonical and staged files share the
//! naming scheme; a staged file becomes canonical through a single rename.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Filesystem store for filter files
#[derive(Debug, Clone)]
pub struct FilterStore {
    dir: PathBuf,
    extension: String,
}

impl FilterStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the filter directory if it does not exist
    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}.{}", id, self.extension))
    }

    fn temp_path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}.{}.tmp", id, self.extension))
    }

    /// Write `body` to the file for `id`
    ///
    /// Content goes to a temporary sibling first and is renamed into place, so
    /// the target path never holds a partial file.
    pub async fn write(&self, id: u64, body: &[u8]) -> io::Result<PathBuf> {
        let target = self.path_for(id);
        let temp = self.temp_path_for(id);

        let result: io::Result<()> = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(body).await?;
            file.sync_all().await?;
            fs::rename(&temp, &target).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        debug!(path = %target.display(), size = body.len(), "Wrote filter file");
        Ok(target)
    }

    /// Rename the staged file for `staged_id` over the canonical file for `canonical_id`
    pub async fn promote(&self, staged_id: u64, canonical_id: u64) -> io::Result<()> {
        fs::rename(self.path_for(staged_id), self.path_for(canonical_id)).await
    }

    pub async fn remove(&self, id: u64) -> io::Result<()> {
        fs::remove_file(self.path_for(id)).await
    }

    /// Read the file for `id` together with its modification time
    pub async fn load(&self, id: u64) -> io::Result<(Vec<u8>, DateTime<Utc>)> {
        let path = self.path_for(id);
        let modified = fs::metadata(&path).await?.modified()?;
        let body = fs::read(&path).await?;
        Ok((body, DateTime::<Utc>::from(modified)))
    }
}
