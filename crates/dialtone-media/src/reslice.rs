use crate::error::MediaError;
use crate::store::{remove_if_present, MediaFile, MediaStore};
use crate::trim::Trimmer;
use std::path::Path;
use std::sync::Arc;

/// Cuts a stored track at an offset into a new, separately served file.
#[derive(Debug, Clone)]
pub struct Reslicer {
    store: MediaStore,
    trimmer: Arc<dyn Trimmer>,
}

impl Reslicer {
    pub fn new(store: MediaStore, trimmer: Arc<dyn Trimmer>) -> Self {
        Self { store, trimmer }
    }

    /// Writes a copy of `source` starting at `offset_seconds` and returns it.
    ///
    /// An output below the minimum size (offset past the end of the track,
    /// usually) counts as a failure and is removed.
    pub async fn slice_from(
        &self,
        source: &Path,
        offset_seconds: f64,
    ) -> Result<MediaFile, MediaError> {
        let file = self.store.allocate();
        tracing::info!(
            source = %source.display(),
            offset_seconds,
            output = %file.filename,
            "re-slicing track"
        );

        if let Err(e) = self.trimmer.trim(source, offset_seconds, &file.path).await {
            remove_if_present(&file.path).await;
            return Err(e);
        }

        if let Err(e) = self.store.verify(&file.path).await {
            remove_if_present(&file.path).await;
            return Err(e);
        }

        self.store.schedule_deletion(file.path.clone());
        Ok(file)
    }
}
