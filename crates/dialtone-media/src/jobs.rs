//! Media Job Runner: one supervised acquisition job per call.
//!
//! `start` records a pending job and spawns the search/download/transcode
//! work in the background. The call flow never waits on it; it polls
//! `status` on every turn until the job is terminal, then consumes it with
//! `finish`.

use crate::error::MediaError;
use crate::fetch::{MediaSource, SearchScope};
use crate::store::{remove_if_present, MediaStore};
use dialtone_types::Track;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Lifecycle of a media job. Moves from `Pending` to one terminal state and
/// never back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done(Track),
    Error(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done(_) => "done",
            Self::Error(_) => "error",
        }
    }
}

/// Snapshot of a call's media job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaJob {
    /// Fresh per attempt; used to discard results of superseded jobs.
    pub id: Uuid,
    pub query: String,
    pub status: JobStatus,
    pub started_at: Instant,
}

impl MediaJob {
    fn new(query: &str, started_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_string(),
            status: JobStatus::Pending,
            started_at,
        }
    }

    /// True once the job has been pending for longer than `budget`.
    ///
    /// Terminal jobs never expire.
    pub fn is_expired(&self, now: Instant, budget: Duration) -> bool {
        self.status == JobStatus::Pending && now.saturating_duration_since(self.started_at) > budget
    }
}

#[derive(Debug)]
struct JobSlot {
    job: MediaJob,
    task: Option<AbortHandle>,
}

/// Call-keyed table of media jobs plus the backend that fulfils them.
#[derive(Debug, Clone)]
pub struct JobRunner {
    jobs: Arc<Mutex<HashMap<String, JobSlot>>>,
    source: Arc<dyn MediaSource>,
    store: MediaStore,
}

impl JobRunner {
    pub fn new(source: Arc<dyn MediaSource>, store: MediaStore) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            source,
            store,
        }
    }

    /// Starts a job for `call_id`, superseding any job the call already has.
    ///
    /// `now` stamps the job's start, against which [`MediaJob::is_expired`]
    /// measures the wait budget. A superseded job that is still running is
    /// aborted, which also kills its acquisition process. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self, call_id: &str, query: &str, now: Instant) -> Uuid {
        let job = MediaJob::new(query, now);
        let job_id = job.id;

        let previous = self
            .slots()
            .insert(call_id.to_string(), JobSlot { job, task: None });
        if let Some(previous) = previous {
            if let Some(task) = previous.task {
                task.abort();
            }
            tracing::info!(
                call_id,
                job_id = %previous.job.id,
                status = previous.job.status.as_str(),
                "superseded media job"
            );
        }

        tracing::info!(call_id, %job_id, query, "starting media job");

        let runner = self.clone();
        let owner = call_id.to_string();
        let query = query.to_string();
        let handle = tokio::spawn(async move {
            let outcome = runner.acquire(&query).await;
            runner.complete(&owner, job_id, outcome).await;
        });

        if let Some(slot) = self.slots().get_mut(call_id) {
            if slot.job.id == job_id {
                slot.task = Some(handle.abort_handle());
            }
        }

        job_id
    }

    /// Returns the call's current job, if any. Never blocks on the job and
    /// never changes it.
    pub fn status(&self, call_id: &str) -> Option<MediaJob> {
        self.slots().get(call_id).map(|slot| slot.job.clone())
    }

    /// Removes and returns the call's job if it has reached a terminal state.
    ///
    /// A pending job is left in place and `None` is returned.
    pub fn finish(&self, call_id: &str) -> Option<MediaJob> {
        let mut slots = self.slots();
        let terminal = slots
            .get(call_id)
            .is_some_and(|slot| slot.job.status.is_terminal());
        if terminal {
            slots.remove(call_id).map(|slot| slot.job)
        } else {
            None
        }
    }

    /// Drops the call's job and aborts its work if still running.
    ///
    /// Returns whether there was a job to cancel.
    pub fn cancel(&self, call_id: &str) -> bool {
        let Some(slot) = self.slots().remove(call_id) else {
            return false;
        };
        if let Some(task) = slot.task {
            task.abort();
        }
        tracing::info!(
            call_id,
            job_id = %slot.job.id,
            status = slot.job.status.as_str(),
            "cancelled media job"
        );
        true
    }

    /// Number of jobs currently tracked, terminal or not.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, JobSlot>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("media job table lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Filtered search first, one broad retry if that yields nothing usable.
    async fn acquire(&self, query: &str) -> Result<Track, MediaError> {
        match self.attempt(query, SearchScope::Filtered).await {
            Ok(track) => Ok(track),
            Err(e) => {
                tracing::warn!(query, error = %e, "filtered search failed, retrying broad search");
                self.attempt(query, SearchScope::Broad).await
            }
        }
    }

    async fn attempt(&self, query: &str, scope: SearchScope) -> Result<Track, MediaError> {
        let file = self.store.allocate();

        let title = match self.source.fetch(query, scope, &file.path).await {
            Ok(title) => title,
            Err(e) => {
                remove_if_present(&file.path).await;
                return Err(e);
            }
        };

        match self.store.verify(&file.path).await {
            Ok(bytes) => {
                tracing::debug!(file = %file.filename, bytes, ?scope, "media file verified");
            }
            Err(e) => {
                remove_if_present(&file.path).await;
                return Err(e);
            }
        }

        self.store.schedule_deletion(file.path.clone());

        Ok(Track {
            title: title.unwrap_or_else(|| query.trim().to_string()),
            url: file.url,
            source_file: file.path,
        })
    }

    /// Records the outcome, unless the job was superseded or cancelled in
    /// the meantime; a stale result is discarded along with its file.
    async fn complete(&self, call_id: &str, job_id: Uuid, outcome: Result<Track, MediaError>) {
        let stale_file = {
            let mut slots = self.slots();
            match slots.get_mut(call_id) {
                Some(slot) if slot.job.id == job_id => {
                    slot.task = None;
                    match outcome {
                        Ok(track) => {
                            tracing::info!(call_id, %job_id, title = %track.title, "media job done");
                            slot.job.status = JobStatus::Done(track);
                        }
                        Err(e) => {
                            tracing::warn!(call_id, %job_id, error = %e, "media job failed");
                            slot.job.status = JobStatus::Error(e.to_string());
                        }
                    }
                    None
                }
                _ => {
                    tracing::info!(call_id, %job_id, "discarding result of stale media job");
                    outcome.ok().map(|track| track.source_file)
                }
            }
        };

        if let Some(path) = stale_file {
            remove_if_present(&path).await;
        }
    }
}
