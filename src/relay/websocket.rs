use std::{
    io,
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info, warn};
use tungstenite::{
    HandshakeError, Message, WebSocket,
    client::IntoClientRequest,
    error::UrlError,
    protocol::{CloseFrame, frame::coding::CloseCode},
    stream::MaybeTlsStream,
};

use crate::relay::error::RelayError;

pub type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Opens a websocket to `url`. Connecting, the handshake and every later
/// read or write on the socket give up after `timeout`.
///
/// Only plain `ws://` urls are supported.
pub fn open(url: &str, timeout: Duration) -> Result<Socket, RelayError> {
    info!("Attempting to connect to: {url}");
    let request = url.into_client_request()?;

    let uri = request.uri();
    let port = match uri.scheme_str() {
        Some("ws") => uri.port_u16().unwrap_or(80),
        Some("wss") => return Err(tungstenite::Error::Url(UrlError::TlsFeatureNotEnabled).into()),
        _ => return Err(tungstenite::Error::Url(UrlError::UnsupportedUrlScheme).into()),
    };
    let host = uri
        .host()
        .ok_or(tungstenite::Error::Url(UrlError::NoHostName))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    let stream = connect_tcp(&host, port, timeout).map_err(tungstenite::Error::Io)?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .and_then(|_| stream.set_nodelay(true))
        .map_err(tungstenite::Error::Io)?;

    let (socket, response) =
        tungstenite::client(request, MaybeTlsStream::Plain(stream)).map_err(|e| match e {
            HandshakeError::Failure(e) => e,
            // the read timeout fired before the server answered
            HandshakeError::Interrupted(_) => tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no handshake response within {timeout:?}"),
            )),
        })?;

    info!(
        "WebSocket connected to: {url} (status {})",
        response.status()
    );
    Ok(socket)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = io::Error::new(
        io::ErrorKind::NotFound,
        format!("could not resolve {host}:{port}"),
    );
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// Outgoing websocket connection. At most one is open at a time.
#[derive(Default)]
pub struct WebSocketSink {
    socket: Option<Socket>,
    url: Option<String>,
}

impl WebSocketSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes over an already opened socket, closing the previous one.
    pub fn attach(&mut self, url: &str, socket: Socket) {
        self.disconnect();
        self.socket = Some(socket);
        self.url = Some(url.to_string());
    }

    /// Closes the connection with a normal close frame. Returns whether one was open.
    pub fn disconnect(&mut self) -> bool {
        let Some(mut socket) = self.socket.take() else {
            return false;
        };

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "User disconnected".into(),
        };
        if let Err(e) = socket.close(Some(frame)).and_then(|_| socket.flush()) {
            debug!("WebSocket close did not complete cleanly: {e}");
        }
        info!(
            "WebSocket disconnected from {}",
            self.url.take().unwrap_or_default()
        );
        true
    }

    pub fn is_connected(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.can_write())
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Sends one text frame. A failed send drops the connection.
    pub fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        let Some(socket) = self.socket.as_mut() else {
            return Err(RelayError::NotConnected);
        };

        if let Err(e) = socket.send(Message::text(text)) {
            warn!("Failed to send to WebSocket, disconnecting: {e}");
            self.socket = None;
            self.url = None;
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        io::Read,
        net::TcpListener,
        sync::mpsc,
        thread::{self, JoinHandle},
        time::Instant,
    };

    pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

    /// Accepts one websocket client and collects its text frames until it closes.
    pub(crate) fn spawn_peer() -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            ready_tx.send(()).unwrap();
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            let mut received = Vec::new();

            loop {
                match socket.read() {
                    Ok(Message::Text(text)) => received.push(text.to_string()),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            received
        });

        ready_rx.recv().unwrap();
        (url, handle)
    }

    /// Accepts one tcp client and never answers its handshake.
    pub(crate) fn spawn_silent_peer() -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0; 1024];
            // drain until the client hangs up
            while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
        });

        (url, handle)
    }

    #[test]
    fn test_send_without_connection() {
        let mut sink = WebSocketSink::new();

        assert!(!sink.is_connected());
        assert!(matches!(
            sink.send_text("x".to_string()),
            Err(RelayError::NotConnected)
        ));
        assert!(!sink.disconnect());
    }

    #[test]
    fn test_connect_send_disconnect() -> anyhow::Result<()> {
        let (url, peer) = spawn_peer();
        let mut sink = WebSocketSink::new();

        sink.attach(&url, open(&url, TIMEOUT)?);
        assert!(sink.is_connected());
        assert_eq!(sink.url(), Some(url.as_str()));

        sink.send_text("hello".to_string())?;
        sink.send_text("world".to_string())?;
        assert!(sink.disconnect());
        assert!(!sink.is_connected());

        let received = peer.join().unwrap();
        assert_eq!(received, vec!["hello", "world"]);

        Ok(())
    }

    #[test]
    fn test_connect_to_nothing_fails() -> anyhow::Result<()> {
        // grab a free port and release it so nobody listens there
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

        let result = open(&format!("ws://127.0.0.1:{port}"), TIMEOUT);

        assert!(matches!(result, Err(RelayError::WebSocket(_))));

        Ok(())
    }

    #[test]
    fn test_unanswered_handshake_times_out() {
        let (url, peer) = spawn_silent_peer();
        let started = Instant::now();

        let result = open(&url, Duration::from_millis(200));

        assert!(matches!(result, Err(RelayError::WebSocket(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
        peer.join().unwrap();
    }

    #[test]
    fn test_secure_and_foreign_urls_are_rejected() {
        assert!(matches!(
            open("wss://example.invalid", TIMEOUT),
            Err(RelayError::WebSocket(tungstenite::Error::Url(
                UrlError::TlsFeatureNotEnabled
            )))
        ));
        assert!(open("http://127.0.0.1:1", TIMEOUT).is_err());
    }
}
