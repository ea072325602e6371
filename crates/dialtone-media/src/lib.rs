//! Media pipeline for the Dialtone IVR service.
//!
//! Turns a caller's free-text request into a playable audio file: an
//! external acquisition backend searches, downloads and transcodes the best
//! match into ephemeral storage, and the file is exposed through a public
//! URL for the telephony provider to play.
//!
//! Acquisition is slow (tens of seconds) while a call can only wait a few
//! seconds per webhook turn, so the work runs as a background job tracked
//! per call in a [`JobRunner`] that the call flow polls. Pausing and resuming
//! playback is implemented by re-slicing: the [`Reslicer`] trims the original
//! file to the resume offset and serves it under a new name.

pub mod config;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod reslice;
pub mod store;
pub mod trim;

pub use config::MediaConfig;
pub use error::MediaError;
pub use fetch::{CommandSource, MediaSource, SearchScope};
pub use jobs::{JobRunner, JobStatus, MediaJob};
pub use reslice::Reslicer;
pub use store::{MediaFile, MediaStore};
pub use trim::{FfmpegTrimmer, Trimmer};
