//! Shared fixtures for call-flow and router tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dialtone_media::{
    JobRunner, MediaConfig, MediaError, MediaSource, MediaStore, Reslicer, SearchScope, Trimmer,
};
use dialtone_server::assistant::{AssistantError, ChatBackend};
use dialtone_server::config::{DiagnosticsConfig, TelephonyConfig};
use dialtone_server::diagnostics::LogBuffer;
use dialtone_server::flow::{CallFlow, FlowSettings, Step, WebhookParams};
use dialtone_server::session::SessionStore;
use dialtone_server::twiml::VoiceResponse;
use dialtone_server::AppState;
use dialtone_types::Turn;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const CALLER: &str = "+15550001111";
pub const STRANGER: &str = "+15559998888";
pub const GOOD_BYTES: usize = 4096;
pub const MIN_BYTES: u64 = 1024;

/// Scripted chat backend. Each reply pops the next scripted answer; `None`
/// fails like an exhausted credential list. A gate holds each reply until
/// notified.
#[derive(Debug, Default)]
pub struct FakeChat {
    replies: Mutex<VecDeque<Option<String>>>,
    /// (transcript length, text) per call.
    calls: Mutex<Vec<(usize, String)>>,
    gate: Option<Arc<Notify>>,
    panics: bool,
}

impl FakeChat {
    pub fn scripted(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            ..Self::default()
        }
    }

    pub fn gated(replies: Vec<Option<&str>>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::scripted(replies)
        }
    }

    /// A backend whose every reply panics.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for FakeChat {
    async fn reply(&self, transcript: &[Turn], text: &str) -> Result<String, AssistantError> {
        self.calls
            .lock()
            .unwrap()
            .push((transcript.len(), text.to_string()));
        if self.panics {
            panic!("chat backend exploded");
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or(AssistantError::Unavailable { attempts: 2 })
    }
}

/// Trim backend that writes a fixed-size file, or fails when told to. A
/// gate holds each trim until notified.
#[derive(Debug, Default)]
pub struct FakeTrimmer {
    fail: bool,
    calls: Mutex<Vec<(PathBuf, f64)>>,
    gate: Option<Arc<Notify>>,
}

impl FakeTrimmer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, f64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Trimmer for FakeTrimmer {
    async fn trim(
        &self,
        source: &Path,
        offset_seconds: f64,
        output: &Path,
    ) -> Result<(), MediaError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), offset_seconds));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(MediaError::Trim("offset beyond end of track".to_string()));
        }
        tokio::fs::write(output, vec![0u8; GOOD_BYTES]).await?;
        Ok(())
    }
}

/// Acquisition backend answering every fetch with the next title, or
/// failing once titles run out. A gate holds each fetch until notified.
#[derive(Debug, Default)]
pub struct FakeSource {
    titles: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, SearchScope)>>,
    gate: Option<Arc<Notify>>,
}

impl FakeSource {
    pub fn titles(titles: &[&str]) -> Self {
        Self {
            titles: Mutex::new(titles.iter().map(|t| t.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn gated(titles: &[&str], gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::titles(titles)
        }
    }

    pub fn calls(&self) -> Vec<(String, SearchScope)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn fetch(
        &self,
        query: &str,
        scope: SearchScope,
        output: &Path,
    ) -> Result<Option<String>, MediaError> {
        self.calls.lock().unwrap().push((query.to_string(), scope));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let title = self.titles.lock().unwrap().pop_front();
        match title {
            Some(title) => {
                tokio::fs::write(output, vec![0u8; GOOD_BYTES]).await?;
                Ok(Some(title))
            }
            None => Err(MediaError::Fetch("no results".to_string())),
        }
    }
}

/// A call flow wired to fakes, with its storage in a temp directory.
pub struct Harness {
    pub flow: Arc<CallFlow>,
    pub chat: Arc<FakeChat>,
    pub source: Arc<FakeSource>,
    pub trimmer: Arc<FakeTrimmer>,
    pub store: MediaStore,
    pub dir: TempDir,
}

pub struct HarnessBuilder {
    chat: FakeChat,
    source: FakeSource,
    trimmer: FakeTrimmer,
}

impl HarnessBuilder {
    pub fn chat(mut self, chat: FakeChat) -> Self {
        self.chat = chat;
        self
    }

    pub fn source(mut self, source: FakeSource) -> Self {
        self.source = source;
        self
    }

    pub fn trimmer(mut self, trimmer: FakeTrimmer) -> Self {
        self.trimmer = trimmer;
        self
    }

    pub fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(&MediaConfig {
            storage_dir: dir.path().to_path_buf(),
            public_base_url: "https://ivr.test".to_string(),
            min_file_bytes: MIN_BYTES,
            ..MediaConfig::default()
        });

        let chat = Arc::new(self.chat);
        let source = Arc::new(self.source);
        let trimmer = Arc::new(self.trimmer);
        let settings = FlowSettings::from_config(&TelephonyConfig {
            allowed_callers: vec![CALLER.to_string()],
            poll_pause_seconds: 1,
            ..TelephonyConfig::default()
        });

        let flow = Arc::new(CallFlow::new(
            SessionStore::new(),
            JobRunner::new(source.clone(), store.clone()),
            chat.clone(),
            Reslicer::new(store.clone(), trimmer.clone()),
            settings,
        ));

        Harness {
            flow,
            chat,
            source,
            trimmer,
            store,
            dir,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        chat: FakeChat::default(),
        source: FakeSource::default(),
        trimmer: FakeTrimmer::default(),
    }
}

impl Harness {
    pub async fn send(&self, step: Step, params: WebhookParams, now: Instant) -> VoiceResponse {
        self.flow.handle_at(step, params, now).await
    }

    pub async fn press(&self, call: &str, step: Step, digits: &str, now: Instant) -> VoiceResponse {
        self.send(step, event(call).digits(digits), now).await
    }

    pub async fn say(&self, call: &str, step: Step, speech: &str, now: Instant) -> VoiceResponse {
        self.send(step, event(call).speech(speech), now).await
    }

    pub async fn redirect(&self, call: &str, step: Step, now: Instant) -> VoiceResponse {
        self.send(step, event(call), now).await
    }

    /// Starts an authorized call and returns the welcome document.
    pub async fn dial(&self, call: &str, now: Instant) -> VoiceResponse {
        self.send(Step::Incoming, event(call), now).await
    }

    pub fn job_is_terminal(&self, call: &str) -> bool {
        self.flow
            .jobs()
            .status(call)
            .is_some_and(|job| job.status.is_terminal())
    }

    pub fn app_state(&self, password: Option<&str>) -> AppState {
        AppState {
            flow: self.flow.clone(),
            media: self.store.clone(),
            logs: LogBuffer::new(50),
            diagnostics: DiagnosticsConfig {
                password: password.map(str::to_string),
                ..DiagnosticsConfig::default()
            },
        }
    }
}

/// Webhook fields for an event on `call` from the allowed caller.
pub fn event(call: &str) -> WebhookParams {
    WebhookParams {
        from: Some(CALLER.to_string()),
        call_sid: Some(call.to_string()),
        ..WebhookParams::default()
    }
}

pub trait WebhookParamsExt {
    fn digits(self, digits: &str) -> Self;
    fn speech(self, speech: &str) -> Self;
    fn from_caller(self, caller: &str) -> Self;
}

impl WebhookParamsExt for WebhookParams {
    fn digits(mut self, digits: &str) -> Self {
        self.digits = Some(digits.to_string());
        self
    }

    fn speech(mut self, speech: &str) -> Self {
        self.speech_result = Some(speech.to_string());
        self
    }

    fn from_caller(mut self, caller: &str) -> Self {
        self.from = Some(caller.to_string());
        self
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
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
