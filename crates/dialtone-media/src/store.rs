//! Ephemeral on-disk storage for playable media.
//!
//! Every produced file gets a fresh UUID name, is served under
//! `<public_base_url>/media/<name>`, and is deleted again once the retention
//! window has passed.

use crate::config::MediaConfig;
use crate::error::MediaError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Extension of every file the pipeline produces.
const MEDIA_EXTENSION: &str = "mp3";

/// A file slot in storage: where it lives on disk and where callers fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
    public_base_url: String,
    min_file_bytes: u64,
    retention: Duration,
}

impl MediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            dir: config.storage_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            min_file_bytes: config.min_file_bytes,
            retention: config.retention(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Creates the storage directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Reserves a new, never reused file name. Nothing is written yet.
    pub fn allocate(&self) -> MediaFile {
        let filename = format!("{}.{}", Uuid::new_v4(), MEDIA_EXTENSION);
        MediaFile {
            path: self.dir.join(&filename),
            url: self.url_for(&filename),
            filename,
        }
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/media/{}", self.public_base_url, filename)
    }

    /// Maps a requested file name onto storage.
    ///
    /// Only bare file names are accepted; anything with a separator, a parent
    /// reference or a leading dot resolves to `None`.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && filename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return None;
        }
        Some(self.dir.join(filename))
    }

    /// Checks that a produced file exists and is large enough to be real audio.
    ///
    /// Returns the file size on success.
    pub async fn verify(&self, path: &Path) -> Result<u64, MediaError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(MediaError::Io(e)),
        };
        let bytes = metadata.len();
        if bytes < self.min_file_bytes {
            return Err(MediaError::TooSmall {
                path: path.to_path_buf(),
                bytes,
                minimum: self.min_file_bytes,
            });
        }
        Ok(bytes)
    }

    /// Deletes `path` after the retention window.
    ///
    /// The file may already be gone (retention sweep, superseded job), so the
    /// delayed task checks for existence before unlinking.
    pub fn schedule_deletion(&self, path: PathBuf) {
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            remove_if_present(&path).await;
        });
    }

    /// Deletes files in the storage directory older than the retention window.
    ///
    /// Returns the number of files removed.
    pub async fn sweep_expired(&self) -> Result<usize, MediaError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(MediaError::Io(e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= self.retention);
            if expired && remove_if_present(&entry.path()).await {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Removes a file if it still exists. Returns whether a file was removed.
pub(crate) async fn remove_if_present(path: &Path) -> bool {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return false;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed media file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove media file");
            false
        }
    }
}
