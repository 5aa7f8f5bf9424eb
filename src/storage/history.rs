use serde::{Deserialize, Serialize};

use crate::domain::track::TrackRecord;

pub const UNKNOWN_ORIGIN: &str = "unknown";

/// A delivered track together with the bookkeeping the relay adds to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub track: TrackRecord,
    pub track_text: String,
    #[serde(default = "unknown_origin")]
    pub origin: String,
}

fn unknown_origin() -> String {
    UNKNOWN_ORIGIN.to_string()
}

impl HistoryEntry {
    /// `<timestamp> | <title> - <artist> (<album>)`
    pub fn export_line(&self) -> String {
        format!(
            "{} | {} - {} ({})",
            self.track.timestamp_iso(),
            self.track.title,
            self.track.artist,
            self.track.album
        )
    }
}

/// one line per entry, in the given order
pub fn export(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .map(HistoryEntry::export_line)
        .collect::<Vec<_>>()
        .join("\n")
}
