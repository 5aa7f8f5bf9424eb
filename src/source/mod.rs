//! Readers of the page's current media metadata

use std::sync::Arc;

use crate::{config::SourceConfig, domain::track::MediaMetadata};

pub mod error;
pub mod file;
pub mod shared;

use error::SourceError;
use file::JsonFileSource;
use shared::SharedSnapshot;

/// Something that can be asked what is playing right now.
///
/// `Ok(None)` means no media session; `Err` is a failed read, which the poller
/// treats as a missed tick.
pub trait MetadataSource: Send {
    fn read(&self) -> Result<Option<MediaMetadata>, SourceError>;

    /// human readable origin, recorded with every delivered track
    fn describe(&self) -> String;
}

impl<S: MetadataSource + Sync + ?Sized> MetadataSource for Arc<S> {
    fn read(&self) -> Result<Option<MediaMetadata>, SourceError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

pub type SharedSource = Arc<dyn MetadataSource + Sync>;

/// Builds the configured source.
///
/// For the http variant the returned snapshot is what `POST /metadata` writes to.
pub fn from_config(config: &SourceConfig) -> (SharedSource, Option<SharedSnapshot>) {
    match config {
        SourceConfig::Http => {
            let snapshot = SharedSnapshot::new();
            (Arc::new(snapshot.clone()), Some(snapshot))
        }
        SourceConfig::File { path } => (Arc::new(JsonFileSource::new(path.clone())), None),
    }
}
