//! Json shapes sent to external consumers

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::{
    artwork::{ArtworkCandidate, SelectedArtwork},
    track::TrackRecord,
};

pub const NOW_PLAYING_TYPE: &str = "amp_now_playing";
pub const TEST_TYPE: &str = "test";
pub const TEST_MESSAGE: &str = "Test message from Apple Music Now Playing Firefox extension";

/// The track fields consumers rely on, without the timestamp
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
    pub artwork: Option<&'a str>,
    pub artwork_info: Option<&'a SelectedArtwork>,
    pub all_artwork: &'a [ArtworkCandidate],
}

impl<'a> From<&'a TrackRecord> for TrackPayload<'a> {
    fn from(track: &'a TrackRecord) -> Self {
        Self {
            title: &track.title,
            artist: &track.artist,
            album: &track.album,
            artwork: track.artwork_source.as_deref(),
            artwork_info: track.selected_artwork.as_ref(),
            all_artwork: &track.all_artwork,
        }
    }
}

/// `{type: "amp_now_playing", timestamp, track, source}`
#[derive(Debug, Serialize)]
pub struct NowPlayingMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: String,
    pub track: TrackPayload<'a>,
    pub source: &'a str,
}

impl<'a> NowPlayingMessage<'a> {
    pub fn new(track: &'a TrackRecord, source: &'a str) -> Self {
        Self {
            kind: NOW_PLAYING_TYPE,
            timestamp: track.timestamp_iso(),
            track: track.into(),
            source,
        }
    }
}

/// `{type: "test", timestamp, track, message, source}`, with the full record as `track`
#[derive(Debug, Serialize)]
pub struct TestMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: String,
    pub track: &'a TrackRecord,
    pub message: &'static str,
    pub source: &'a str,
}

impl<'a> TestMessage<'a> {
    pub fn new(track: &'a TrackRecord, source: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            kind: TEST_TYPE,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            track,
            message: TEST_MESSAGE,
            source,
        }
    }
}

/// Flat record used by the json file format: `{timestamp, title, artist, ...}`
#[derive(Debug, Serialize)]
pub struct FileRecord<'a> {
    pub timestamp: String,
    #[serde(flatten)]
    pub track: TrackPayload<'a>,
}

impl<'a> From<&'a TrackRecord> for FileRecord<'a> {
    fn from(track: &'a TrackRecord) -> Self {
        Self {
            timestamp: track.timestamp_iso(),
            track: track.into(),
        }
    }
}
