//! Track change detection over polled media metadata

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::domain::track::{MediaMetadata, TrackKey, TrackRecord};

/// What a tick without metadata does to the last seen key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentPolicy {
    /// absence carries no information, the last key stays
    #[default]
    Keep,
    /// absence forgets the last key, so the same track is reported again once it reappears
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DetectorState {
    pub last_key: Option<TrackKey>,
}

impl DetectorState {
    /// state as it would be right after `record` was reported
    pub fn after(record: &TrackRecord) -> Self {
        Self {
            last_key: Some(record.key()),
        }
    }
}

/// Reports a track record only when the identity key changes between polls.
///
/// Not meant to be shared: one poller owns one detector and calls it once per tick.
#[derive(Debug, Default)]
pub struct TrackChangeDetector {
    state: DetectorState,
    absent_policy: AbsentPolicy,
}

impl TrackChangeDetector {
    pub fn new(absent_policy: AbsentPolicy) -> Self {
        Self::with_state(DetectorState::default(), absent_policy)
    }

    pub fn with_state(state: DetectorState, absent_policy: AbsentPolicy) -> Self {
        Self {
            state,
            absent_policy,
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn poll(&mut self, metadata: Option<&MediaMetadata>) -> Option<TrackRecord> {
        self.poll_at(metadata, Utc::now())
    }

    pub fn poll_at(
        &mut self,
        metadata: Option<&MediaMetadata>,
        now: DateTime<Utc>,
    ) -> Option<TrackRecord> {
        let Some(metadata) = metadata else {
            if self.absent_policy == AbsentPolicy::Reset && self.state.last_key.is_some() {
                debug!("No media metadata, forgetting last track");
                self.state.last_key = None;
            }
            return None;
        };

        let record = TrackRecord::from_metadata(metadata, now);
        let key = record.key();

        if self.state.last_key.as_ref() == Some(&key) {
            return None;
        }

        info!(
            "New track detected: {} (artwork candidates: {}, selected: {})",
            key,
            record.all_artwork.len(),
            record
                .selected_artwork
                .as_ref()
                .map(|a| a.sizes.as_str())
                .unwrap_or("none")
        );
        self.state.last_key = Some(key);
        Some(record)
    }
}
