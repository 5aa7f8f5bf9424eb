use std::fmt::Display;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::artwork::{ArtworkCandidate, SelectedArtwork, select_largest};

pub const UNKNOWN: &str = "Unknown";

/// Now-playing metadata as published by the page's media session.
///
/// Deserialization never fails on a wrong field type: such fields read as absent,
/// and artwork entries that are not objects are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "lenient_artwork")]
    pub artwork: Option<Vec<ArtworkCandidate>>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

fn lenient_artwork<'de, D>(deserializer: D) -> Result<Option<Vec<ArtworkCandidate>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(entries) = value else {
        return Ok(None);
    };

    Ok(Some(
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
    ))
}

/// Identity of a track: `title|artist|album`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey(pub String);

impl TrackKey {
    pub fn of(title: &str, artist: &str, album: &str) -> Self {
        Self(format!("{title}|{artist}|{album}"))
    }
}

impl Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A detected track. Created once per change and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(serialize_with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "artwork")]
    pub artwork_source: Option<String>,
    #[serde(rename = "artworkInfo")]
    pub selected_artwork: Option<SelectedArtwork>,
    #[serde(default)]
    pub all_artwork: Vec<ArtworkCandidate>,
}

/// serializes like javascript's `Date.toISOString`, e.g. `2024-05-01T12:00:00.000Z`
pub fn iso_millis<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn or_unknown(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

impl TrackRecord {
    /// normalizes metadata into a record, filling gaps with "Unknown"
    pub fn from_metadata(metadata: &MediaMetadata, timestamp: DateTime<Utc>) -> Self {
        let all_artwork = metadata.artwork.clone().unwrap_or_default();
        let selected_artwork = select_largest(Some(&all_artwork));

        Self {
            title: or_unknown(&metadata.title),
            artist: or_unknown(&metadata.artist),
            album: or_unknown(&metadata.album),
            timestamp,
            artwork_source: selected_artwork.as_ref().map(|a| a.src.clone()),
            selected_artwork,
            all_artwork,
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::of(&self.title, &self.artist, &self.album)
    }

    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `[12:00:00] Title - Artist (Album)`, stamped with the given local time
    pub fn summary_line(&self, at: DateTime<Local>) -> String {
        format!(
            "[{}] {} - {} ({})",
            at.format("%H:%M:%S"),
            self.title,
            self.artist,
            self.album
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_full_metadata() -> anyhow::Result<()> {
        let json = r#"{
            "title": "Song",
            "artist": "Artist",
            "album": "Album",
            "artwork": [
                {"sizes": "100x100", "src": "a"},
                {"sizes": "500x500", "src": "b", "type": "image/png"}
            ]
        }"#;

        let metadata: MediaMetadata = serde_json::from_str(json)?;

        assert_eq!(metadata.title.as_deref(), Some("Song"));
        assert_eq!(metadata.artwork.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            metadata.artwork.unwrap()[1].media_type.as_deref(),
            Some("image/png")
        );

        Ok(())
    }

    #[test]
    fn test_malformed_metadata_degrades() -> anyhow::Result<()> {
        let json = r#"{"title": 42, "artwork": "not a list"}"#;

        let metadata: MediaMetadata = serde_json::from_str(json)?;

        assert_eq!(metadata.title, None);
        assert_eq!(metadata.artwork, None);

        let record = TrackRecord::from_metadata(&metadata, fixed_time());
        assert_eq!(record.title, UNKNOWN);
        assert_eq!(record.artist, UNKNOWN);
        assert_eq!(record.album, UNKNOWN);
        assert!(record.all_artwork.is_empty());
        assert_eq!(record.selected_artwork, None);
        assert_eq!(record.artwork_source, None);

        Ok(())
    }

    #[test]
    fn test_non_object_artwork_entries_are_dropped() -> anyhow::Result<()> {
        let json = r#"{"artwork": [7, {"sizes": "10x10", "src": "ok"}, null]}"#;

        let metadata: MediaMetadata = serde_json::from_str(json)?;

        assert_eq!(metadata.artwork.unwrap().len(), 1);

        Ok(())
    }

    #[test]
    fn test_empty_strings_become_unknown() {
        let metadata = MediaMetadata {
            title: Some(String::new()),
            artist: Some("Artist".to_string()),
            album: None,
            artwork: None,
        };

        let record = TrackRecord::from_metadata(&metadata, fixed_time());

        assert_eq!(record.title, UNKNOWN);
        assert_eq!(record.artist, "Artist");
        assert_eq!(record.key(), TrackKey("Unknown|Artist|Unknown".to_string()));
    }

    #[test]
    fn test_record_selects_largest_artwork() -> anyhow::Result<()> {
        let metadata: MediaMetadata = serde_json::from_str(
            r#"{"title":"Song","artist":"Artist","album":"Album",
                "artwork":[{"sizes":"100x100","src":"a"},{"sizes":"500x500","src":"b"}]}"#,
        )?;

        let record = TrackRecord::from_metadata(&metadata, fixed_time());

        assert_eq!(record.artwork_source.as_deref(), Some("b"));
        assert_eq!(record.selected_artwork.unwrap().pixel_area, 250_000);
        assert_eq!(record.all_artwork.len(), 2);

        Ok(())
    }

    #[test]
    fn test_record_wire_shape() -> anyhow::Result<()> {
        let metadata = MediaMetadata {
            title: Some("Song".to_string()),
            ..Default::default()
        };
        let record = TrackRecord::from_metadata(&metadata, fixed_time());

        let json = serde_json::to_value(&record)?;

        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["title"], "Song");
        assert!(json["artwork"].is_null());
        assert!(json["artworkInfo"].is_null());
        assert_eq!(json["allArtwork"], serde_json::json!([]));

        // history restores records from their own json
        let back: TrackRecord = serde_json::from_value(json)?;
        assert_eq!(back, record);

        Ok(())
    }

    #[test]
    fn test_key_is_case_and_whitespace_sensitive() {
        assert_ne!(TrackKey::of("A", "x", "y"), TrackKey::of("a", "x", "y"));
        assert_ne!(TrackKey::of("A", "x", "y"), TrackKey::of("A ", "x", "y"));
        assert_eq!(TrackKey::of("A", "x", "y").to_string(), "A|x|y");
    }
}
