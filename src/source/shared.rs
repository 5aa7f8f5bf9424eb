use std::sync::{Arc, Mutex};

use crate::domain::track::MediaMetadata;

use super::{MetadataSource, error::SourceError};

/// Latest metadata pushed by the page over http, shared with the poller
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<Option<MediaMetadata>>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, metadata: Option<MediaMetadata>) -> Result<(), SourceError> {
        let mut current = self.lock()?;
        *current = metadata;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SourceError> {
        self.set(None)
    }

    pub fn is_present(&self) -> bool {
        self.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<MediaMetadata>>, SourceError> {
        self.inner
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("snapshot lock poisoned: {e}")))
    }
}

impl MetadataSource for SharedSnapshot {
    fn read(&self) -> Result<Option<MediaMetadata>, SourceError> {
        Ok(self.lock()?.clone())
    }

    fn describe(&self) -> String {
        "http-ingest".to_string()
    }
}
