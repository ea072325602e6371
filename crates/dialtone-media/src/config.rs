use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_storage_dir() -> PathBuf {
    std::env::temp_dir().join("dialtone-media")
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_fetch_binary() -> PathBuf {
    PathBuf::from("scripts/dialtone-fetch")
}

fn default_ffmpeg_binary() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Anything smaller is treated as silence or a truncated download.
fn default_min_file_bytes() -> u64 {
    16 * 1024
}

fn default_retention_seconds() -> u64 {
    20 * 60
}

fn default_fetch_timeout_seconds() -> u64 {
    120
}

fn default_trim_timeout_seconds() -> u64 {
    30
}

fn default_max_duration_seconds() -> u64 {
    15 * 60
}

/// Media pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Local directory holding fetched and re-sliced files.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Externally reachable base address; media URLs are `<base>/media/<file>`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Acquisition wrapper (search + download + transcode).
    #[serde(default = "default_fetch_binary")]
    pub fetch_binary: PathBuf,
    /// ffmpeg used to trim a track to a start offset.
    #[serde(default = "default_ffmpeg_binary")]
    pub ffmpeg_binary: PathBuf,
    #[serde(default = "default_min_file_bytes")]
    pub min_file_bytes: u64,
    /// How long produced files stay on disk.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "default_trim_timeout_seconds")]
    pub trim_timeout_seconds: u64,
    /// Duration filter applied to the first (filtered) search attempt.
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            public_base_url: default_public_base_url(),
            fetch_binary: default_fetch_binary(),
            ffmpeg_binary: default_ffmpeg_binary(),
            min_file_bytes: default_min_file_bytes(),
            retention_seconds: default_retention_seconds(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            trim_timeout_seconds: default_trim_timeout_seconds(),
            max_duration_seconds: default_max_duration_seconds(),
        }
    }
}

impl MediaConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn trim_timeout(&self) -> Duration {
        Duration::from_secs(self.trim_timeout_seconds)
    }
}
