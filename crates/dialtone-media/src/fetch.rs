//! Media acquisition backend: free-text query in, playable audio file out.

use crate::error::MediaError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Maximum query size passed to the acquisition backend.
const MAX_QUERY_BYTES: usize = 512;

/// How wide a catalog search should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// First attempt: results filtered by duration.
    Filtered,
    /// Retry: no filters, best match wins.
    Broad,
}

/// Searches a catalog, downloads the best match and transcodes it to `output`.
///
/// Implementations return the title of the track they fetched, if known.
#[async_trait]
pub trait MediaSource: Send + Sync + std::fmt::Debug {
    async fn fetch(
        &self,
        query: &str,
        scope: SearchScope,
        output: &Path,
    ) -> Result<Option<String>, MediaError>;
}

/// Runs an external acquisition wrapper.
///
/// The wrapper is invoked as
/// `<binary> --query <q> --output <path> [--max-duration <secs>]` and must
/// leave the audio at `<path>`. The first non-empty line it prints on stdout
/// is taken as the track title.
#[derive(Debug, Clone)]
pub struct CommandSource {
    binary: PathBuf,
    max_duration_seconds: u64,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(binary: impl Into<PathBuf>, max_duration_seconds: u64, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            max_duration_seconds,
            timeout,
        }
    }
}

#[async_trait]
impl MediaSource for CommandSource {
    async fn fetch(
        &self,
        query: &str,
        scope: SearchScope,
        output: &Path,
    ) -> Result<Option<String>, MediaError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MediaError::Fetch("query is empty".to_string()));
        }
        if query.len() > MAX_QUERY_BYTES {
            return Err(MediaError::Fetch(format!(
                "query exceeds maximum size: {} bytes (limit: {} bytes)",
                query.len(),
                MAX_QUERY_BYTES
            )));
        }

        let mut command = Command::new(&self.binary);
        command
            .arg("--query")
            .arg(query)
            .arg("--output")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A superseded job is aborted by dropping its future; the child
            // must not outlive it.
            .kill_on_drop(true);

        if scope == SearchScope::Filtered {
            command
                .arg("--max-duration")
                .arg(self.max_duration_seconds.to_string());
        }

        let child = command.spawn().map_err(|e| {
            MediaError::Fetch(format!("Failed to spawn {:?}: {}", self.binary, e))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                MediaError::Fetch(format!(
                    "fetch process timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MediaError::Fetch(format!("Failed to wait for fetch process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Fetch(format!(
                "fetch process failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}
