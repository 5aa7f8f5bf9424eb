use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::{
    io::Read,
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    config::HttpConfig,
    domain::track::{MediaMetadata, TrackRecord},
    http::error::ApiError,
    relay::{self, TrackRelay, file::FileFormat},
    source::{MetadataSource, SharedSource, shared::SharedSnapshot},
};

/// Control surface of a running relay: metadata ingest, status, history and sink actions
pub struct HttpServer {
    relay: Arc<Mutex<TrackRelay>>,
    source: SharedSource,
    ingest: Option<SharedSnapshot>,
    monitoring: Arc<AtomicBool>,
    pub config: HttpConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    monitoring: bool,
    has_media_session: bool,
    source: String,
    websocket_connected: bool,
    websocket_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CurrentTrackResponse {
    track: Option<TrackRecord>,
    monitoring: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileTestRequest {
    path: Option<PathBuf>,
    format: Option<FileFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct SaveRequest {
    content: String,
    path: PathBuf,
}

impl HttpServer {
    pub fn new(
        relay: Arc<Mutex<TrackRelay>>,
        source: SharedSource,
        ingest: Option<SharedSnapshot>,
        monitoring: Arc<AtomicBool>,
        config: HttpConfig,
    ) -> Self {
        Self {
            relay,
            source,
            ingest,
            monitoring,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (POST) (/metadata) => { self.handle_set_metadata(request) },
            (DELETE) (/metadata) => { self.handle_clear_metadata() },
            (GET) (/status) => { self.handle_status() },
            (GET) (/track/current) => { self.handle_current_track() },
            (GET) (/history) => { self.handle_history() },
            (GET) (/history/export) => { self.handle_export_history() },
            (POST) (/monitoring/start) => { self.set_monitoring(true) },
            (POST) (/monitoring/stop) => { self.set_monitoring(false) },
            (POST) (/websocket/connect) => { self.handle_connect(request) },
            (POST) (/websocket/disconnect) => { self.handle_disconnect() },
            (POST) (/websocket/test) => { self.handle_test_websocket() },
            (POST) (/file/test) => { self.handle_test_file(request) },
            (POST) (/file/save) => { self.handle_save_file(request) },
            _ => Err(ApiError::NotFound(format!("no route for {}", request.url())))
        );

        let response = result
            .unwrap_or_else(ApiError::into_response)
            .with_additional_header("Access-Control-Allow-Origin", "*");

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn relay(&self) -> Result<MutexGuard<'_, TrackRelay>, ApiError> {
        self.relay
            .lock()
            .map_err(|e| ApiError::Internal(format!("could not access relay under lock: {e}")))
    }

    fn success() -> Response {
        Response::json(&json!({ "success": true }))
    }

    /// Parses the body as json regardless of content type; an empty body gives the default.
    ///
    /// Pages usually post `text/plain` to stay clear of cors preflights.
    fn parse_body<T: DeserializeOwned + Default>(request: &Request) -> Result<T, ApiError> {
        let mut body = String::new();
        if let Some(mut data) = request.data() {
            data.read_to_string(&mut body)
                .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        }

        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid json body: {e}")))
    }

    fn ingest(&self) -> Result<&SharedSnapshot, ApiError> {
        self.ingest.as_ref().ok_or_else(|| {
            ApiError::Conflict(format!(
                "metadata ingest is disabled, source is {}",
                self.source.describe()
            ))
        })
    }

    fn handle_set_metadata(&self, request: &Request) -> Result<Response, ApiError> {
        let metadata: Option<MediaMetadata> = Self::parse_body(request)?;
        self.ingest()?.set(metadata)?;
        Ok(Self::success())
    }

    fn handle_clear_metadata(&self) -> Result<Response, ApiError> {
        self.ingest()?.clear()?;
        Ok(Self::success())
    }

    fn handle_status(&self) -> Result<Response, ApiError> {
        let has_media_session = self.source.read().map(|m| m.is_some()).unwrap_or(false);
        let (websocket_connected, websocket_url) = {
            let relay = self.relay()?;
            (
                relay.websocket_connected(),
                relay.websocket_url().map(str::to_string),
            )
        };

        Ok(Response::json(&StatusResponse {
            monitoring: self.monitoring.load(Ordering::Relaxed),
            has_media_session,
            source: self.source.describe(),
            websocket_connected,
            websocket_url,
        }))
    }

    fn handle_current_track(&self) -> Result<Response, ApiError> {
        let track = self.relay()?.last_track()?;

        Ok(Response::json(&CurrentTrackResponse {
            track,
            monitoring: self.monitoring.load(Ordering::Relaxed),
        }))
    }

    fn handle_history(&self) -> Result<Response, ApiError> {
        let history = self.relay()?.history()?;
        Ok(Response::json(&history))
    }

    fn handle_export_history(&self) -> Result<Response, ApiError> {
        let text = self.relay()?.export_history()?;
        Ok(Response::text(text))
    }

    fn set_monitoring(&self, on: bool) -> Result<Response, ApiError> {
        self.monitoring.store(on, Ordering::Relaxed);
        info!("Monitoring {}", if on { "started" } else { "stopped" });
        Ok(Self::success())
    }

    fn handle_connect(&self, request: &Request) -> Result<Response, ApiError> {
        let body: ConnectRequest = Self::parse_body(request)?;
        relay::connect_shared(&self.relay, body.url.as_deref())?;
        Ok(Self::success())
    }

    fn handle_disconnect(&self) -> Result<Response, ApiError> {
        self.relay()?.disconnect_websocket();
        Ok(Self::success())
    }

    fn handle_test_websocket(&self) -> Result<Response, ApiError> {
        self.relay()?.test_websocket(None)?;
        Ok(Self::success())
    }

    fn handle_test_file(&self, request: &Request) -> Result<Response, ApiError> {
        let body: FileTestRequest = Self::parse_body(request)?;
        let written = self
            .relay()?
            .test_file_write(None, body.path.as_deref(), body.format)?;

        Ok(Response::json(
            &json!({ "success": true, "path": written.to_string_lossy() }),
        ))
    }

    fn handle_save_file(&self, request: &Request) -> Result<Response, ApiError> {
        let body: SaveRequest = Self::parse_body(request)?;
        self.relay()?.save_to_file(&body.content, &body.path)?;
        Ok(Self::success())
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
