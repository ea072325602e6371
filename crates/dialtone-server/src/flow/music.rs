//! Music search, the job polling loop, playback and pause/resume.

use super::{CallEvent, CallFlow, FlowError, Input, Step};
use crate::playback::{self, PlaybackError};
use crate::twiml::{Gather, GatherInput, VoiceResponse};
use dialtone_media::JobStatus;
use dialtone_types::keys::{self, HistoryMove};
use dialtone_types::{CallMode, Track};
use std::time::Instant;

impl CallFlow {
    /// Entering the music menu stops any playback clock. Input that arrives
    /// here is treated as a search.
    pub(super) async fn music_menu(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        if event.input != Input::Nothing {
            return self.music_search(event, now).await;
        }
        self.session(&event.call_id, now, |s| {
            s.mode = CallMode::Music;
            s.pending_query = None;
            playback::stop(s);
        })?;
        Ok(self.music_menu_prompt(None))
    }

    pub(super) async fn music_search(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        let call_id = &event.call_id;
        match &event.input {
            Input::Digits(d) => match HistoryMove::from_key(d) {
                Some(direction) => self.navigate(call_id, direction, now),
                None => Ok(self.music_menu_prompt(Some("Sorry, that is not an option."))),
            },
            Input::Speech(text) => {
                let query = normalize_query(text);
                if query.is_empty() {
                    return Ok(self.music_menu_prompt(None));
                }
                self.session(call_id, now, |s| {
                    s.mode = CallMode::Music;
                    s.pending_query = Some(query.clone());
                    playback::stop(s);
                })?;
                let job_id = self.jobs.start(call_id, &query, now);
                tracing::info!(call_id = %call_id, %job_id, query = %query, "search requested");
                Ok(self
                    .response()
                    .say(format!("Searching for {}.", query))
                    .pause(self.settings.poll_pause_seconds)
                    .redirect(Step::MusicWaiting.path()))
            }
            Input::Nothing => Ok(self.music_menu_prompt(None)),
        }
    }

    /// One turn of the polling loop. Reads the job without changing it until
    /// it is terminal or over budget.
    pub(super) fn music_wait(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        let call_id = &event.call_id;
        let Some(job) = self.jobs.status(call_id) else {
            self.session(call_id, now, |s| s.pending_query = None)?;
            return Ok(self.music_menu_prompt(Some("There is no search in progress.")));
        };

        if !job.status.is_terminal() {
            if job.is_expired(now, self.settings.wait_budget) {
                self.jobs.cancel(call_id);
                self.session(call_id, now, |s| s.pending_query = None)?;
                return Err(FlowError::MediaJobTimeout(self.settings.wait_budget));
            }
            return Ok(self
                .response()
                .say("Still searching. Please wait.")
                .pause(self.settings.poll_pause_seconds)
                .redirect(Step::MusicWaiting.path()));
        }

        let job = self
            .jobs
            .finish(call_id)
            .ok_or_else(|| FlowError::Internal("finished job disappeared".to_string()))?;
        self.session(call_id, now, |s| s.pending_query = None)?;

        match job.status {
            JobStatus::Done(track) => {
                self.session(call_id, now, |s| {
                    s.push_track(track.clone());
                    playback::start_track(s, track.clone(), now);
                })?;
                tracing::info!(call_id = %call_id, title = %track.title, "track ready");
                Ok(self.playing_document(&track.title, &track.url))
            }
            JobStatus::Error(reason) => Err(FlowError::MediaJobFailed(reason)),
            JobStatus::Pending => Err(FlowError::Internal("pending job finished".to_string())),
        }
    }

    pub(super) async fn music_playing(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        let call_id = &event.call_id;
        let key = event.digits();

        if key == Some(keys::PAUSE) {
            let played = self.session(call_id, now, |s| playback::mark_pause(s, now))?;
            tracing::info!(call_id = %call_id, played_seconds = played, "paused");
            return Ok(self.paused_prompt(Some("Paused.")));
        }

        if let Some(direction) = key.and_then(HistoryMove::from_key) {
            return self.navigate(call_id, direction, now);
        }

        // Any other key interrupted the track; carry on where it stopped.
        self.session(call_id, now, |s| playback::mark_pause(s, now))?;
        self.resume(call_id, now).await
    }

    pub(super) async fn music_paused(
        &self,
        event: &CallEvent,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        if event.digits() == Some(keys::RESUME) {
            self.resume(&event.call_id, now).await
        } else {
            Ok(self.paused_prompt(None))
        }
    }

    async fn resume(&self, call_id: &str, now: Instant) -> Result<VoiceResponse, FlowError> {
        let title = self.session(call_id, now, |s| {
            s.current_track.as_ref().map(|t| t.title.clone())
        })?;

        match playback::prepare_resume(&self.sessions, call_id, &self.reslicer, now).await {
            Ok(file) => Ok(self.playing_document(title.as_deref().unwrap_or("your track"), &file.url)),
            Err(PlaybackError::CallEnded) => Err(FlowError::CallEnded(call_id.to_string())),
            Err(e) => {
                self.session(call_id, now, |s| {
                    s.current_track = None;
                    s.accumulated_play_seconds = 0.0;
                    playback::stop(s);
                })?;
                Err(FlowError::ResliceFailed(e))
            }
        }
    }

    fn navigate(
        &self,
        call_id: &str,
        direction: HistoryMove,
        now: Instant,
    ) -> Result<VoiceResponse, FlowError> {
        let track: Option<Track> = self.session(call_id, now, |s| {
            let track = s.navigate(direction).cloned()?;
            s.mode = CallMode::Music;
            playback::start_track(s, track.clone(), now);
            Some(track)
        })?;
        Ok(match track {
            Some(track) => {
                tracing::info!(call_id, ?direction, title = %track.title, "history navigation");
                self.playing_document(&track.title, &track.url)
            }
            None => self.music_menu_prompt(Some("There is nothing in your play history yet.")),
        })
    }

    pub(super) fn music_menu_prompt(&self, lead: Option<&str>) -> VoiceResponse {
        let mut doc = self.response();
        if let Some(lead) = lead {
            doc = doc.say(lead);
        }
        doc.gather(
            Gather::new(GatherInput::SpeechAndDtmf, Step::MusicSearch.path())
                .num_digits(1)
                .timeout(6)
                .say(
                    "Say what you would like to hear. Press 4 for the previous track, \
                     5 to replay, or 6 for the next one.",
                ),
        )
        .redirect(Step::MusicMenu.path())
    }

    /// Plays `url` while listening for playback keys. When the track ends
    /// the call drops back to the music menu.
    fn playing_document(&self, title: &str, url: &str) -> VoiceResponse {
        self.response()
            .say(format!("Playing {}. Press 1 to pause.", title))
            .gather(
                Gather::new(GatherInput::Dtmf, Step::MusicPlaying.path())
                    .num_digits(1)
                    .timeout(2)
                    .play(url),
            )
            .redirect(Step::MusicMenu.path())
    }

    fn paused_prompt(&self, lead: Option<&str>) -> VoiceResponse {
        let gather = Gather::new(GatherInput::Dtmf, Step::MusicPaused.path())
            .num_digits(1)
            .timeout(30);
        let gather = match lead {
            Some(lead) => gather.say(format!("{} Press 1 to resume.", lead)),
            None => gather.say("Press 1 to resume, or 0 for the main menu."),
        };
        self.response()
            .gather(gather)
            .redirect(Step::MusicPaused.path())
    }
}

/// Trims the recognizer's sentence punctuation from a spoken query.
fn normalize_query(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string()
}
