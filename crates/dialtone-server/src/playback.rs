//! Playback position tracking across pause and resume.
//!
//! The telephony layer can only play a file from its beginning, so the
//! tracker measures wall-clock play time and, on resume, has the original
//! file re-sliced at the accumulated offset.

use crate::session::{Session, SessionStore};
use dialtone_media::{MediaError, MediaFile, Reslicer};
use dialtone_types::Track;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no paused track to resume")]
    NothingToResume,

    /// The call ended while the trim was running.
    #[error("call ended before playback could resume")]
    CallEnded,

    #[error("re-slice failed: {0}")]
    Reslice(#[from] MediaError),
}

/// Where playback should pick up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    /// Original, untrimmed file of the current track.
    pub source: PathBuf,
    pub offset_seconds: f64,
}

/// Starts `track` from the beginning.
pub fn start_track(session: &mut Session, track: Track, now: Instant) {
    session.current_track = Some(track);
    session.play_started_at = Some(now);
    session.accumulated_play_seconds = 0.0;
}

/// Stops the play clock without forgetting the track.
pub fn stop(session: &mut Session) {
    session.play_started_at = None;
}

/// Adds the time played since the last start or resume to the accumulated
/// total and stops the clock. Pausing while paused changes nothing.
///
/// Returns the seconds played so far.
pub fn mark_pause(session: &mut Session, now: Instant) -> f64 {
    if let Some(started) = session.play_started_at.take() {
        session.accumulated_play_seconds += now.saturating_duration_since(started).as_secs_f64();
    }
    session.accumulated_play_seconds
}

/// The offset a resume should start from, if there is a track to resume.
pub fn resume_point(session: &Session) -> Option<ResumePoint> {
    session.current_track.as_ref().map(|track| ResumePoint {
        source: track.source_file.clone(),
        offset_seconds: session.accumulated_play_seconds,
    })
}

/// Restarts the play clock. The accumulated total stays as the baseline for
/// the next pause.
pub fn mark_resumed(session: &mut Session, now: Instant) {
    if session.play_started_at.is_none() {
        session.play_started_at = Some(now);
    }
}

/// Produces a new playable file starting where the call's track was paused
/// and restarts the play clock.
///
/// The session lock is not held while the trim runs.
pub async fn prepare_resume(
    sessions: &SessionStore,
    call_id: &str,
    reslicer: &Reslicer,
    now: Instant,
) -> Result<MediaFile, PlaybackError> {
    let point = sessions
        .with(call_id, now, |s| resume_point(s))
        .ok_or(PlaybackError::CallEnded)?
        .ok_or(PlaybackError::NothingToResume)?;

    let file = reslicer
        .slice_from(&point.source, point.offset_seconds)
        .await?;

    sessions
        .with(call_id, now, |s| mark_resumed(s, now))
        .ok_or(PlaybackError::CallEnded)?;
    tracing::info!(
        call_id,
        offset_seconds = point.offset_seconds,
        file = %file.filename,
        "resuming playback"
    );
    Ok(file)
}
