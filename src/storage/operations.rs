use rusqlite::{OptionalExtension, params};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config,
    domain::track::TrackRecord,
    storage::{
        db,
        error::StorageError,
        history::HistoryEntry,
        schema::{columns::*, keys, tables::*},
    },
};

/// Main structure that implements all storage logic
pub struct Storage {
    pub(crate) db: rusqlite::Connection,
}

impl Storage {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// Adds an entry to the front of the history and drops everything beyond `limit`.
    pub fn push_history(&mut self, entry: &HistoryEntry, limit: usize) -> Result<(), StorageError> {
        let json = serde_json::to_string(entry).map_err(|e| StorageError::Corrupted {
            key: HISTORY.to_string(),
            source: e,
        })?;

        let tx = self.db.transaction()?;

        tx.execute(
            &format!("INSERT INTO {HISTORY} ({ENTRY}) VALUES (?1)"),
            params![json],
        )?;

        // newest rows have the largest ids
        tx.execute(
            &format!(
                "DELETE FROM {HISTORY} WHERE {ID} NOT IN
                 (SELECT {ID} FROM {HISTORY} ORDER BY {ID} DESC LIMIT ?1)"
            ),
            params![limit as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// history, newest first
    pub fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut stmt = self
            .db
            .prepare(&format!("SELECT {ENTRY} FROM {HISTORY} ORDER BY {ID} DESC"))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StorageError::Corrupted {
                    key: HISTORY.to_string(),
                    source: e,
                })
            })
            .collect()
    }

    pub fn set_value<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Corrupted {
            key: key.to_string(),
            source: e,
        })?;

        self.db.execute(
            &format!(
                "INSERT INTO {STATE} ({KEY}, {VALUE}) VALUES (?1, ?2)
                 ON CONFLICT({KEY}) DO UPDATE SET {VALUE} = excluded.{VALUE}"
            ),
            params![key, json],
        )?;
        Ok(())
    }

    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let json: Option<String> = self
            .db
            .query_row(
                &format!("SELECT {VALUE} FROM {STATE} WHERE {KEY} = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupted {
                key: key.to_string(),
                source: e,
            })
        })
        .transpose()
    }

    pub fn last_track(&self) -> Result<Option<TrackRecord>, StorageError> {
        self.get_value(keys::LAST_TRACK)
    }

    pub fn set_last_track(&mut self, track: &TrackRecord) -> Result<(), StorageError> {
        self.set_value(keys::LAST_TRACK, track)
    }

    pub fn websocket_connected(&self) -> Result<bool, StorageError> {
        Ok(self
            .get_value(keys::WEBSOCKET_CONNECTED)?
            .unwrap_or(false))
    }

    pub fn set_websocket_connected(&mut self, connected: bool) -> Result<(), StorageError> {
        self.set_value(keys::WEBSOCKET_CONNECTED, &connected)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::track::MediaMetadata;
    use chrono::{TimeZone, Utc};
    use rusqlite::Connection;

    pub(crate) fn in_memory_storage() -> Storage {
        let conn = Connection::open_in_memory().unwrap();
        crate::storage::schema::init(&conn).unwrap();
        Storage::from_existing_conn(conn)
    }

    pub(crate) fn mock_track(title: &str) -> TrackRecord {
        let metadata = MediaMetadata {
            title: Some(title.to_string()),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            artwork: None,
        };
        TrackRecord::from_metadata(&metadata, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn mock_entry(title: &str) -> HistoryEntry {
        HistoryEntry {
            track: mock_track(title),
            track_text: format!("[12:00:00] {title} - Artist (Album)"),
            origin: "test".to_string(),
        }
    }

    #[test]
    fn test_history_is_newest_first() -> anyhow::Result<()> {
        let mut storage = in_memory_storage();

        storage.push_history(&mock_entry("one"), 10)?;
        storage.push_history(&mock_entry("two"), 10)?;
        storage.push_history(&mock_entry("three"), 10)?;

        let titles: Vec<_> = storage
            .history()?
            .into_iter()
            .map(|e| e.track.title)
            .collect();

        assert_eq!(titles, vec!["three", "two", "one"]);

        Ok(())
    }

    #[test]
    fn test_history_is_capped() -> anyhow::Result<()> {
        let mut storage = in_memory_storage();

        for i in 0..105 {
            storage.push_history(&mock_entry(&format!("t{i}")), 100)?;
        }

        let history = storage.history()?;

        assert_eq!(history.len(), 100);
        assert_eq!(history[0].track.title, "t104");
        assert_eq!(history[99].track.title, "t5");

        Ok(())
    }

    #[test]
    fn test_history_entry_roundtrips_through_db() -> anyhow::Result<()> {
        let mut storage = in_memory_storage();
        let entry = mock_entry("song");

        storage.push_history(&entry, 1)?;

        assert_eq!(storage.history()?, vec![entry]);

        Ok(())
    }

    #[test]
    fn test_key_value_overwrite() -> anyhow::Result<()> {
        let mut storage = in_memory_storage();

        assert!(!storage.websocket_connected()?);

        storage.set_websocket_connected(true)?;
        assert!(storage.websocket_connected()?);

        storage.set_websocket_connected(false)?;
        assert!(!storage.websocket_connected()?);

        Ok(())
    }

    #[test]
    fn test_last_track() -> anyhow::Result<()> {
        let mut storage = in_memory_storage();

        assert_eq!(storage.last_track()?, None);

        let track = mock_track("latest");
        storage.set_last_track(&track)?;

        assert_eq!(storage.last_track()?, Some(track));

        Ok(())
    }

    #[test]
    fn test_corrupted_value_is_reported() -> anyhow::Result<()> {
        let storage = in_memory_storage();
        storage.db.execute(
            &format!("INSERT INTO {STATE} ({KEY}, {VALUE}) VALUES (?1, ?2)"),
            params![keys::LAST_TRACK, "{not json"],
        )?;

        let result = storage.last_track();

        assert!(matches!(result, Err(StorageError::Corrupted { .. })));

        Ok(())
    }
}
