//! Track records produced by the media pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A playable audio track.
///
/// `url` is what the telephony provider fetches; `source_file` is the local
/// file behind it, kept so playback can be re-sliced from an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Human-readable title announced before playback.
    pub title: String,
    /// Public URL served by the media endpoint.
    pub url: String,
    /// Path of the original, untrimmed file on local storage.
    pub source_file: PathBuf,
}
