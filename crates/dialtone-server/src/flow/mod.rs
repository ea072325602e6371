//! Call State Machine.
//!
//! The telephony provider delivers each caller action as a stateless
//! webhook; the route it arrives on names the state the previous document
//! left the call in. [`CallFlow::handle`] maps that state plus the event's
//! input onto the next document, touching the session store, media jobs and
//! AI backend as needed. Errors never escape: every [`FlowError`] is turned
//! into a document that keeps the call moving.

mod chat;
mod music;

use crate::assistant::{AssistantError, ChatBackend};
use crate::config::TelephonyConfig;
use crate::playback::PlaybackError;
use crate::session::{Session, SessionStore};
use crate::twiml::{Gather, GatherInput, VoiceResponse};
use dialtone_media::{JobRunner, Reslicer};
use dialtone_types::{keys, CallMode};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Spoken whenever something unexpected went wrong.
pub const APOLOGY: &str = "Sorry, something went wrong. Returning to the main menu.";

/// A state of the call, identified by the webhook route it is served on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Call start; authorization gate.
    Incoming,
    MainMenu,
    Chat,
    TextEntry,
    MusicMenu,
    MusicSearch,
    MusicWaiting,
    MusicPlaying,
    MusicPaused,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Incoming,
        Step::MainMenu,
        Step::Chat,
        Step::TextEntry,
        Step::MusicMenu,
        Step::MusicSearch,
        Step::MusicWaiting,
        Step::MusicPlaying,
        Step::MusicPaused,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Incoming => "/voice/incoming",
            Self::MainMenu => "/voice/menu",
            Self::Chat => "/voice/chat",
            Self::TextEntry => "/voice/text",
            Self::MusicMenu => "/voice/music",
            Self::MusicSearch => "/voice/music/search",
            Self::MusicWaiting => "/voice/music/wait",
            Self::MusicPlaying => "/voice/music/playing",
            Self::MusicPaused => "/voice/music/paused",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::MainMenu => "main_menu",
            Self::Chat => "chat",
            Self::TextEntry => "text_entry",
            Self::MusicMenu => "music_menu",
            Self::MusicSearch => "music_search",
            Self::MusicWaiting => "music_waiting",
            Self::MusicPlaying => "music_playing",
            Self::MusicPaused => "music_paused",
        }
    }
}

/// Form fields posted by the telephony provider. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookParams {
    pub from: Option<String>,
    pub call_sid: Option<String>,
    pub digits: Option<String>,
    pub speech_result: Option<String>,
    pub call_status: Option<String>,
}

/// What the caller did, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Nothing,
    Digits(String),
    Speech(String),
}

/// A validated webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub call_id: String,
    pub caller: Option<String>,
    pub input: Input,
}

impl CallEvent {
    pub fn digits(&self) -> Option<&str> {
        match &self.input {
            Input::Digits(d) => Some(d),
            _ => None,
        }
    }

    pub fn speech(&self) -> Option<&str> {
        match &self.input {
            Input::Speech(s) => Some(s),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<WebhookParams> for CallEvent {
    type Error = FlowError;

    /// Digits win when an event carries both digits and speech.
    fn try_from(params: WebhookParams) -> Result<Self, Self::Error> {
        let call_id = non_empty(params.call_sid)
            .ok_or_else(|| FlowError::MalformedEvent("missing CallSid".to_string()))?;
        let input = match (non_empty(params.digits), non_empty(params.speech_result)) {
            (Some(digits), _) => Input::Digits(digits),
            (None, Some(speech)) => Input::Speech(speech),
            (None, None) => Input::Nothing,
        };
        Ok(Self {
            call_id,
            caller: non_empty(params.from),
            input,
        })
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("caller {caller:?} is not allowed")]
    Unauthorized { caller: Option<String> },

    #[error(transparent)]
    AssistantUnavailable(#[from] AssistantError),

    #[error("media job failed: {0}")]
    MediaJobFailed(String),

    #[error("media job still pending after {0:?}")]
    MediaJobTimeout(Duration),

    #[error("resume failed: {0}")]
    ResliceFailed(#[from] PlaybackError),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The call ended or was pruned while the event was being handled.
    #[error("call {0} has no session")]
    CallEnded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Call-flow tunables, resolved once at startup.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub allowed_callers: HashSet<String>,
    pub voice: String,
    pub language: String,
    pub poll_pause_seconds: u32,
    pub wait_budget: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &TelephonyConfig) -> Self {
        Self {
            allowed_callers: config
                .allowed_callers
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            voice: config.voice.clone(),
            language: config.language.clone(),
            poll_pause_seconds: config.poll_pause_seconds,
            wait_budget: config.wait_budget(),
        }
    }
}

/// The generic apology document: safe to serve from any state.
pub fn apology(voice: &str, language: &str) -> VoiceResponse {
    VoiceResponse::new(voice, language)
        .say(APOLOGY)
        .redirect(Step::MainMenu.path())
}

/// Owns the per-call stores and the collaborators a call can reach.
#[derive(Debug)]
pub struct CallFlow {
    sessions: SessionStore,
    jobs: JobRunner,
    assistant: Arc<dyn ChatBackend>,
    reslicer: Reslicer,
    settings: FlowSettings,
}

impl CallFlow {
    pub fn new(
        sessions: SessionStore,
        jobs: JobRunner,
        assistant: Arc<dyn ChatBackend>,
        reslicer: Reslicer,
        settings: FlowSettings,
    ) -> Self {
        Self {
            sessions,
            jobs,
            assistant,
            reslicer,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.jobs
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Handles one webhook event at the current time.
    pub async fn handle(&self, step: Step, params: WebhookParams) -> VoiceResponse {
        self.handle_at(step, params, Instant::now()).await
    }

    /// Handles one webhook event as if it arrived at `now`.
    pub async fn handle_at(&self, step: Step, params: WebhookParams, now: Instant) -> VoiceResponse {
        let event = match CallEvent::try_from(params) {
            Ok(event) => event,
            Err(e) => return self.recover(step, None, e),
        };

        tracing::debug!(
            call_id = %event.call_id,
            step = step.as_str(),
            input = ?event.input,
            "call event"
        );

        match self.dispatch(step, &event, now).await {
            Ok(doc) => doc,
            Err(e) => self.recover(step, Some(&event.call_id), e),
        }
    }

    /// Drops everything held for a call that has ended.
    pub fn end_call(&self, call_id: &str) {
        let had_session = self.sessions.remove(call_id).is_some();
        let had_job = self.jobs.cancel(call_id);
        tracing::info!(call_id, had_session, had_job, "call ended");
    }

    /// Drops sessions idle for longer than `idle` and cancels their jobs.
    ///
    /// Returns how many sessions were dropped.
    pub fn prune_idle(&self, now: Instant, idle: Duration) -> usize {
        let dropped = self.sessions.prune_idle(now, idle);
        for call_id in &dropped {
            self.jobs.cancel(call_id);
            tracing::info!(call_id = %call_id, "pruned idle session");
        }
        dropped.len()
    }

    async fn dispatch(
        &self,
        step: Step,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        if step == Step::Incoming {
            return self.incoming(event, now);
        }

        // Only an authorized call start creates a session.
        if !self.sessions.contains(&event.call_id) {
            tracing::warn!(call_id = %event.call_id, step = step.as_str(), "event for unknown call");
            return Err(FlowError::Unauthorized {
                caller: event.caller.clone(),
            });
        }

        // A chunk that is exactly the reset key always resets, mid-message
        // included; a `0` inside a longer keypad chunk is a space.
        if event.digits() == Some(keys::RESET) {
            return self.reset(event, now);
        }

        match step {
            Step::Incoming => self.incoming(event, now),
            Step::MainMenu => self.main_menu(event, now),
            Step::Chat => self.chat(event, now).await,
            Step::TextEntry => self.text_entry(event, now).await,
            Step::MusicMenu => self.music_menu(event, now).await,
            Step::MusicSearch => self.music_search(event, now).await,
            Step::MusicWaiting => self.music_wait(event, now),
            Step::MusicPlaying => self.music_playing(event, now).await,
            Step::MusicPaused => self.music_paused(event, now).await,
        }
    }

    /// Runs `f` on the call's session. Fails when the call has ended, so a
    /// result that arrives after hangup is dropped instead of reviving it.
    fn session<R>(
        &self,
        call_id: &str,
        now: Instant,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, FlowError> {
        self.sessions
            .with(call_id, now, f)
            .ok_or_else(|| FlowError::CallEnded(call_id.to_string()))
    }

    fn incoming(&self, event: &CallEvent, now: Instant) -> Result<VoiceResponse, FlowError> {
        let allowed = event
            .caller
            .as_ref()
            .is_some_and(|c| self.settings.allowed_callers.contains(c));
        if !allowed {
            return Err(FlowError::Unauthorized {
                caller: event.caller.clone(),
            });
        }

        self.jobs.cancel(&event.call_id);
        self.sessions.reset(&event.call_id, now);
        tracing::info!(call_id = %event.call_id, "call started");

        Ok(self.menu_prompt(Some("Welcome to Dialtone.")))
    }

    fn reset(&self, event: &CallEvent, now: Instant) -> Result<VoiceResponse, FlowError> {
        self.jobs.cancel(&event.call_id);
        self.session(&event.call_id, now, |s| s.reset_to_menu())?;
        tracing::info!(call_id = %event.call_id, "reset to main menu");
        Ok(self.menu_prompt(Some("Main menu.")))
    }

    fn main_menu(&self, event: &CallEvent, now: Instant) -> Result<VoiceResponse, FlowError> {
        let call_id = &event.call_id;
        let enter = |mode: CallMode| {
            self.session(call_id, now, |s| {
                s.reset_to_menu();
                s.mode = mode;
            })
        };
        match event.digits() {
            Some(keys::MENU_VOICE_CHAT) => {
                enter(CallMode::VoiceChat)?;
                Ok(self.chat_prompt(Some(
                    "You are talking with the assistant. Press 9 for music or 0 for the main menu.",
                )))
            }
            Some(keys::MENU_TEXT_ENTRY) => {
                enter(CallMode::TextEntry)?;
                Ok(self.text_prompt(Some(
                    "Type your message with the keypad, star between letters on the same key, \
                     and pound to send.",
                )))
            }
            Some(keys::MENU_MUSIC) => {
                enter(CallMode::Music)?;
                Ok(self.music_menu_prompt(None))
            }
            Some(_) => Ok(self.menu_prompt(Some("Sorry, that is not an option."))),
            None => Ok(self.menu_prompt(None)),
        }
    }

    fn response(&self) -> VoiceResponse {
        VoiceResponse::new(&self.settings.voice, &self.settings.language)
    }

    fn menu_prompt(&self, lead: Option<&str>) -> VoiceResponse {
        let mut doc = self.response();
        if let Some(lead) = lead {
            doc = doc.say(lead);
        }
        doc.gather(
            Gather::new(GatherInput::Dtmf, Step::MainMenu.path())
                .num_digits(1)
                .timeout(8)
                .say(
                    "Press 1 to talk with the assistant, 2 to type a message, or 3 for music. \
                     Press 0 at any time to come back here.",
                ),
        )
        .redirect(Step::MainMenu.path())
    }

    /// Converts a failure into the document that keeps the call going.
    fn recover(&self, step: Step, call_id: Option<&str>, error: FlowError) -> VoiceResponse {
        let call_id = call_id.unwrap_or("-");
        match error {
            FlowError::Unauthorized { caller } => {
                tracing::warn!(call_id, caller = ?caller, step = step.as_str(), "rejecting call");
                self.response().hangup()
            }
            FlowError::AssistantUnavailable(e) => {
                tracing::warn!(call_id, error = %e, "assistant unavailable");
                let lead = "Sorry, I can't reach the assistant right now. Please try again.";
                match step {
                    Step::TextEntry => self.text_prompt(Some(lead)),
                    _ => self.chat_prompt(Some(lead)),
                }
            }
            e @ (FlowError::MediaJobFailed(_) | FlowError::MediaJobTimeout(_)) => {
                tracing::warn!(call_id, error = %e, "media job did not produce a track");
                self.music_menu_prompt(Some("Sorry, I couldn't find that track."))
            }
            FlowError::ResliceFailed(e) => {
                tracing::warn!(call_id, error = %e, "could not resume playback");
                self.music_menu_prompt(Some("Sorry, I couldn't resume that track."))
            }
            FlowError::MalformedEvent(reason) => {
                tracing::warn!(call_id, step = step.as_str(), reason = %reason, "malformed event");
                match step {
                    Step::Incoming => self.response().hangup(),
                    _ => self
                        .response()
                        .say("Sorry, I didn't catch that.")
                        .redirect(step.path()),
                }
            }
            FlowError::CallEnded(call) => {
                tracing::info!(call_id = %call, step = step.as_str(), "dropping result for ended call");
                self.response().hangup()
            }
            FlowError::Internal(reason) => {
                tracing::error!(call_id, step = step.as_str(), reason = %reason, "call flow failure");
                apology(&self.settings.voice, &self.settings.language)
            }
        }
    }
}
