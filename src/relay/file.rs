use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    config::FileConfig,
    domain::track::TrackRecord,
    relay::{error::RelayError, payload::FileRecord},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// `Artist - Title`
    Simple,
    /// one json object per line
    Json,
    /// `[time] Title - Artist (Album) | Artwork: sizes (src)`
    #[default]
    Detailed,
}

/// Renders one line (with trailing newline) for the given format.
///
/// `now` is only used by the detailed format.
pub fn format_track(
    track: &TrackRecord,
    format: FileFormat,
    now: DateTime<Local>,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        FileFormat::Simple => format!("{} - {}\n", track.artist, track.title),
        FileFormat::Json => format!("{}\n", serde_json::to_string(&FileRecord::from(track))?),
        FileFormat::Detailed => {
            let artwork = track
                .selected_artwork
                .as_ref()
                .map(|a| format!(" | Artwork: {} ({})", a.sizes, a.src))
                .unwrap_or_default();
            format!(
                "[{}] {} - {} ({}){}\n",
                now.format("%Y-%m-%d %H:%M:%S"),
                track.title,
                track.artist,
                track.album,
                artwork
            )
        }
    })
}

/// `dir/name.txt` -> `dir/test_name.txt`
pub fn test_file_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "now_playing.txt".to_string());
    path.with_file_name(format!("test_{name}"))
}

pub fn append(path: &Path, content: &str) -> Result<(), RelayError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Appends every delivered track to a text file when auto save is on
#[derive(Debug, Clone)]
pub struct FileSink {
    config: FileConfig,
}

impl FileSink {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// the target file, when the sink is switched on and configured
    pub fn target(&self) -> Option<&Path> {
        if !self.config.auto_save {
            return None;
        }
        self.config.path.as_deref()
    }

    pub fn write(&self, track: &TrackRecord, now: DateTime<Local>) -> Result<Option<PathBuf>, RelayError> {
        let Some(path) = self.target() else {
            return Ok(None);
        };

        let content = format_track(track, self.config.format, now)?;
        append(path, &content)?;
        Ok(Some(path.to_path_buf()))
    }
}
