use crate::error::MediaError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Produces a copy of `source` that starts `offset_seconds` into it.
///
/// The playback layer cannot seek, so resuming a paused track means serving
/// a new file that begins at the resume point.
#[async_trait]
pub trait Trimmer: Send + Sync + std::fmt::Debug {
    async fn trim(
        &self,
        source: &Path,
        offset_seconds: f64,
        output: &Path,
    ) -> Result<(), MediaError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTrimmer {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegTrimmer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Trimmer for FfmpegTrimmer {
    async fn trim(
        &self,
        source: &Path,
        offset_seconds: f64,
        output: &Path,
    ) -> Result<(), MediaError> {
        if !offset_seconds.is_finite() || offset_seconds < 0.0 {
            return Err(MediaError::Trim(format!(
                "invalid offset: {}",
                offset_seconds
            )));
        }
        if !source.exists() {
            return Err(MediaError::Missing(source.to_path_buf()));
        }

        // -ss before -i: input seeking, fast and accurate enough for speech/music.
        let mut command = Command::new(&self.binary);
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", offset_seconds))
            .arg("-i")
            .arg(source)
            .arg("-vn")
            .arg("-c:a")
            .arg("libmp3lame")
            .arg("-q:a")
            .arg("4")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| MediaError::Trim(format!("Failed to spawn ffmpeg: {}", e)))?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                MediaError::Trim(format!(
                    "ffmpeg timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MediaError::Trim(format!("Failed to wait for ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::Trim(format!("ffmpeg failed: {}", stderr.trim())));
        }

        Ok(())
    }
}
