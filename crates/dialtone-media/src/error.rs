use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Trim error: {0}")]
    Trim(String),

    #[error("Media file too small: {path:?} is {bytes} bytes (minimum {minimum})")]
    TooSmall {
        path: PathBuf,
        bytes: u64,
        minimum: u64,
    },

    #[error("Media file missing: {0:?}")]
    Missing(PathBuf),
}
