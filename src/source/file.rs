use std::{io::ErrorKind, path::PathBuf};

use crate::domain::track::MediaMetadata;

use super::{MetadataSource, error::SourceError};

/// Reads metadata from a json file that a page-side helper keeps rewriting.
///
/// A missing or blank file, or a `null` document, means nothing is playing.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MetadataSource for JsonFileSource {
    fn read(&self) -> Result<Option<MediaMetadata>, SourceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SourceError::Io(e)),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        Ok(serde_json::from_str::<Option<MediaMetadata>>(&contents)?)
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.to_string_lossy())
    }
}
