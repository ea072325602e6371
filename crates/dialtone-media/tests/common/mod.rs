//! Shared fixtures for media pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dialtone_media::{MediaConfig, MediaError, MediaSource, MediaStore, SearchScope};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Bytes written for a "good" fetch; above the test minimum.
pub const GOOD_BYTES: usize = 4096;

/// Minimum file size configured for tests.
pub const MIN_BYTES: u64 = 1024;

pub fn test_config(dir: &Path) -> MediaConfig {
    MediaConfig {
        storage_dir: dir.to_path_buf(),
        public_base_url: "https://ivr.test".to_string(),
        min_file_bytes: MIN_BYTES,
        ..MediaConfig::default()
    }
}

pub fn test_store(dir: &Path) -> MediaStore {
    MediaStore::new(&test_config(dir))
}

/// What the scripted source does on one fetch call.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Writes `bytes` zero bytes to the output and reports `title`.
    Write { bytes: usize, title: Option<String> },
    /// Fails without producing a file.
    Fail(String),
}

impl Plan {
    pub fn good(title: &str) -> Self {
        Self::Write {
            bytes: GOOD_BYTES,
            title: Some(title.to_string()),
        }
    }
}

/// In-process acquisition backend following a script of plans.
///
/// When a gate is set, every fetch waits for one `notify_one` before acting.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    plans: Mutex<VecDeque<Plan>>,
    calls: Mutex<Vec<(String, SearchScope, PathBuf)>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            ..Self::default()
        }
    }

    pub fn gated(plans: Vec<Plan>, gate: Arc<Notify>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, SearchScope, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn fetch(
        &self,
        query: &str,
        scope: SearchScope,
        output: &Path,
    ) -> Result<Option<String>, MediaError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), scope, output.to_path_buf()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Plan::Fail("no plan left".to_string()));

        match plan {
            Plan::Write { bytes, title } => {
                tokio::fs::write(output, vec![0u8; bytes]).await?;
                Ok(title)
            }
            Plan::Fail(reason) => Err(MediaError::Fetch(reason)),
        }
    }
}

/// Writes an executable shell script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("failed to write mock script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)
            .expect("mock script metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("failed to chmod mock script");
    }
    path
}

/// Polls until `check` holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
