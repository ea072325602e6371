//! Conversation store: per-call transcript, mode and playback state.
//!
//! Sessions are keyed by call identifier, created only when an authorized
//! call starts, and dropped when the call ends or goes idle.

use dialtone_types::keys::HistoryMove;
use dialtone_types::{CallMode, Track, Turn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// In-memory state of one call.
#[derive(Debug, Clone)]
pub struct Session {
    /// Conversation so far, in order. Fed verbatim to the AI backend.
    pub transcript: Vec<Turn>,
    pub mode: CallMode,
    /// Every track fetched during the call, in fetch order.
    pub play_history: Vec<Track>,
    /// Index into `play_history`; valid whenever the history is non-empty.
    pub history_cursor: usize,
    /// Track currently associated with playback.
    pub current_track: Option<Track>,
    /// When playback of `current_track` last started or resumed. `None`
    /// while paused or stopped.
    pub play_started_at: Option<Instant>,
    /// Seconds of `current_track` consumed before `play_started_at`.
    pub accumulated_play_seconds: f64,
    /// Raw keypad codes not yet decoded into text.
    pub pending_input: String,
    /// Query of the media job the call is waiting on.
    pub pending_query: Option<String>,
    pub last_activity: Instant,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self {
            transcript: Vec::new(),
            mode: CallMode::Idle,
            play_history: Vec::new(),
            history_cursor: 0,
            current_track: None,
            play_started_at: None,
            accumulated_play_seconds: 0.0,
            pending_input: String::new(),
            pending_query: None,
            last_activity: now,
        }
    }

    /// Clears mode-specific transient state and returns to the main menu.
    ///
    /// The transcript and play history belong to the call and survive.
    pub fn reset_to_menu(&mut self) {
        self.mode = CallMode::Idle;
        self.pending_input.clear();
        self.pending_query = None;
        self.current_track = None;
        self.play_started_at = None;
        self.accumulated_play_seconds = 0.0;
    }

    /// Appends a freshly fetched track and points the cursor at it.
    pub fn push_track(&mut self, track: Track) -> &Track {
        self.play_history.push(track);
        self.history_cursor = self.play_history.len() - 1;
        &self.play_history[self.history_cursor]
    }

    /// Moves the history cursor and returns the track it lands on.
    ///
    /// Previous stops at the first entry, next at the last; replay stays put.
    /// Returns `None` when there is no history.
    pub fn navigate(&mut self, direction: HistoryMove) -> Option<&Track> {
        if self.play_history.is_empty() {
            return None;
        }
        let last = self.play_history.len() - 1;
        let cursor = self.history_cursor.min(last);
        self.history_cursor = match direction {
            HistoryMove::Previous => cursor.saturating_sub(1),
            HistoryMove::Replay => cursor,
            HistoryMove::Next => (cursor + 1).min(last),
        };
        self.play_history.get(self.history_cursor)
    }
}

/// Call-keyed session table.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards any session for the call and creates a fresh one.
    pub fn reset(&self, call_id: &str, now: Instant) {
        self.lock()
            .insert(call_id.to_string(), Session::new(now));
    }

    /// Runs `f` on the call's session and marks it active.
    ///
    /// Returns `None` without calling `f` when the call has no session, for
    /// instance because it ended while an await was in flight. The lock is
    /// held for the duration of `f`, which must not block.
    pub fn with<R>(
        &self,
        call_id: &str,
        now: Instant,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(call_id)?;
        session.last_activity = now;
        Some(f(session))
    }

    /// Returns a copy of the call's session, if it exists.
    pub fn snapshot(&self, call_id: &str) -> Option<Session> {
        self.lock().get(call_id).cloned()
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.lock().contains_key(call_id)
    }

    pub fn remove(&self, call_id: &str) -> Option<Session> {
        self.lock().remove(call_id)
    }

    /// Drops sessions without activity for longer than `idle`.
    ///
    /// Returns the identifiers of the dropped calls.
    pub fn prune_idle(&self, now: Instant, idle: Duration) -> Vec<String> {
        let mut sessions = self.lock();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity) > idle)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            sessions.remove(id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session table lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
