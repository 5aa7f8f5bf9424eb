//! Fan-out of detected tracks to history, websocket and file

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::{DateTime, Local, Utc};
use crossbeam_channel::Receiver;
use log::{error, info, warn};

use crate::{
    config::{RelayConfig, WebSocketConfig},
    domain::track::TrackRecord,
    relay::{
        error::RelayError,
        file::{FileFormat, FileSink},
        payload::{NowPlayingMessage, TestMessage},
        websocket::{Socket, WebSocketSink},
    },
    storage::{
        history::{self, HistoryEntry},
        operations::Storage,
    },
};

pub mod error;
pub mod file;
pub mod payload;
pub mod websocket;

/// A detected track on its way to the relay, tagged with where it came from
#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub track: TrackRecord,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// the sink is switched off or not connected
    Skipped,
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub history: SinkOutcome,
    pub websocket: SinkOutcome,
    pub file: SinkOutcome,
}

pub struct TrackRelay {
    storage: Storage,
    websocket: WebSocketSink,
    file: FileSink,
    history_limit: usize,
    source_tag: String,
    test_source_tag: String,
    websocket_config: WebSocketConfig,
}

impl TrackRelay {
    pub fn new(storage: Storage, config: RelayConfig) -> Self {
        let mut relay = Self {
            storage,
            websocket: WebSocketSink::new(),
            file: FileSink::new(config.file),
            history_limit: config.history_limit,
            source_tag: config.source_tag,
            test_source_tag: config.test_source_tag,
            websocket_config: config.websocket,
        };
        // a connection never survives a restart
        relay.store_connected(false);
        relay
    }

    #[cfg(test)]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn websocket_connected(&self) -> bool {
        self.websocket.is_connected()
    }

    pub fn websocket_url(&self) -> Option<&str> {
        self.websocket.url()
    }

    /// Records the track and hands it to every configured sink.
    ///
    /// A failing sink is logged and reported, the remaining sinks still run.
    pub fn deliver(&mut self, event: &TrackEvent) -> DeliveryReport {
        self.deliver_at(event, Local::now())
    }

    pub fn deliver_at(&mut self, event: &TrackEvent, now: DateTime<Local>) -> DeliveryReport {
        let track = &event.track;
        let entry = HistoryEntry {
            track: track.clone(),
            track_text: track.summary_line(now),
            origin: event.origin.clone(),
        };

        let history = match self.record(&entry) {
            Ok(()) => {
                info!("Track saved: {}", entry.track_text);
                SinkOutcome::Delivered
            }
            Err(e) => {
                error!("Failed to store track history: {e}");
                SinkOutcome::Failed(e.to_string())
            }
        };

        let websocket = if self.websocket.is_connected() {
            match self.send_now_playing(track) {
                Ok(()) => SinkOutcome::Delivered,
                Err(e) => {
                    error!("Failed to send to WebSocket: {e}");
                    SinkOutcome::Failed(e.to_string())
                }
            }
        } else {
            SinkOutcome::Skipped
        };

        let file = match self.file.write(track, now) {
            Ok(Some(path)) => {
                info!("Track appended to file: {}", path.to_string_lossy());
                SinkOutcome::Delivered
            }
            Ok(None) => SinkOutcome::Skipped,
            Err(e) => {
                error!("Failed to write track to file: {e}");
                SinkOutcome::Failed(e.to_string())
            }
        };

        DeliveryReport {
            history,
            websocket,
            file,
        }
    }

    fn record(&mut self, entry: &HistoryEntry) -> Result<(), RelayError> {
        self.storage.push_history(entry, self.history_limit)?;
        self.storage.set_last_track(&entry.track)?;
        Ok(())
    }

    fn send_now_playing(&mut self, track: &TrackRecord) -> Result<(), RelayError> {
        let text = serde_json::to_string(&NowPlayingMessage::new(track, &self.source_tag))?;
        let sent = self.websocket.send_text(text);
        if sent.is_err() {
            self.store_connected(false);
        }
        sent
    }

    fn store_connected(&mut self, connected: bool) {
        if let Err(e) = self.storage.set_websocket_connected(connected) {
            warn!("Failed to store websocket state: {e}");
        }
    }

    /// Connects to `url`, or to the configured url when none is given.
    ///
    /// Blocks for the whole handshake. With the relay behind a shared lock use
    /// [`connect_shared`] instead.
    pub fn connect_websocket(&mut self, url: Option<&str>) -> Result<(), RelayError> {
        let url = self.websocket_target(url);
        let socket = websocket::open(&url, self.websocket_config.timeout());
        self.attach_websocket(&url, socket)
    }

    /// `url`, or the configured one
    pub fn websocket_target(&self, url: Option<&str>) -> String {
        url.map(str::to_string)
            .unwrap_or_else(|| self.websocket_config.url.clone())
    }

    pub fn websocket_timeout(&self) -> Duration {
        self.websocket_config.timeout()
    }

    /// Installs the outcome of [`websocket::open`] and stores the connection flag.
    pub fn attach_websocket(
        &mut self,
        url: &str,
        socket: Result<Socket, RelayError>,
    ) -> Result<(), RelayError> {
        let result = socket.map(|socket| self.websocket.attach(url, socket));
        self.store_connected(result.is_ok());
        result
    }

    pub fn disconnect_websocket(&mut self) {
        if !self.websocket.disconnect() {
            info!("WebSocket was not connected");
        }
        self.store_connected(false);
    }

    /// connects on startup when the config asks for it; failures are only logged
    pub fn auto_connect(&mut self) {
        if !self.websocket_config.auto_connect || self.websocket_config.url.is_empty() {
            info!("Auto-connect disabled or no URL configured");
            return;
        }

        info!("Auto-connecting to WebSocket: {}", self.websocket_config.url);
        match self.connect_websocket(None) {
            Ok(()) => info!("Auto-connect successful"),
            Err(e) => warn!("Auto-connect failed: {e}"),
        }
    }

    /// Sends a test message built from `track`, or from the last stored track.
    pub fn test_websocket(&mut self, track: Option<&TrackRecord>) -> Result<(), RelayError> {
        if !self.websocket.is_connected() {
            return Err(RelayError::NotConnected);
        }
        let track = self.track_or_last(track)?;

        let message = TestMessage::new(&track, &self.test_source_tag, Utc::now());
        let text = serde_json::to_string(&message)?;
        self.websocket.send_text(text)
    }

    /// Writes `track` to `test_<name>` next to `path`, returns the written path.
    ///
    /// Path and format fall back to the file sink config.
    pub fn test_file_write(
        &self,
        track: Option<&TrackRecord>,
        path: Option<&Path>,
        format: Option<FileFormat>,
    ) -> Result<PathBuf, RelayError> {
        let path = path
            .or(self.file.config().path.as_deref())
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(RelayError::NoFilePath)?;
        let format = format.unwrap_or(self.file.config().format);
        let track = self.track_or_last(track)?;

        let content = file::format_track(&track, format, Local::now())?;
        let target = file::test_file_path(path);
        std::fs::write(&target, content)?;
        info!("Test track written to {}", target.to_string_lossy());
        Ok(target)
    }

    /// writes arbitrary content to `path`, replacing what was there
    pub fn save_to_file(&self, content: &str, path: &Path) -> Result<(), RelayError> {
        if path.as_os_str().is_empty() {
            return Err(RelayError::NoFilePath);
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>, RelayError> {
        Ok(self.storage.history()?)
    }

    pub fn export_history(&self) -> Result<String, RelayError> {
        Ok(history::export(&self.storage.history()?))
    }

    pub fn last_track(&self) -> Result<Option<TrackRecord>, RelayError> {
        Ok(self.storage.last_track()?)
    }

    fn track_or_last(&self, track: Option<&TrackRecord>) -> Result<TrackRecord, RelayError> {
        match track {
            Some(t) => Ok(t.clone()),
            None => self.storage.last_track()?.ok_or(RelayError::NoTrack),
        }
    }
}

/// Connects the shared relay's websocket without holding the lock during the handshake.
///
/// Deliveries and other callers keep running while the peer answers.
pub fn connect_shared(relay: &Mutex<TrackRelay>, url: Option<&str>) -> Result<(), RelayError> {
    let (url, timeout) = {
        let relay = relay.lock().map_err(|_| RelayError::Poisoned)?;
        (relay.websocket_target(url), relay.websocket_timeout())
    };

    let socket = websocket::open(&url, timeout);

    relay
        .lock()
        .map_err(|_| RelayError::Poisoned)?
        .attach_websocket(&url, socket)
}

/// Delivers every event from `events` until all senders are gone.
pub fn spawn_worker(relay: Arc<Mutex<TrackRelay>>, events: Receiver<TrackEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            match relay.lock() {
                Ok(mut relay) => {
                    relay.deliver(&event);
                }
                Err(e) => {
                    error!("Relay lock poisoned, dropping track {}: {e}", event.track.key());
                }
            }
        }
        info!("Relay worker stopped");
    })
}
