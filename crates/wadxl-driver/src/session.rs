//! Connection lifecycle for the wireless accelerometer.
//!
//! Two channels are used:
//!
//! - a WebSocket stream at `ws://{host}:{stream_port}/` carrying sample
//!   records, read by a background task that appends into the shared
//!   [`SampleBuffer`];
//! - short-lived HTTP `GET` requests to `http://{host}:{control_port}/start`
//!   and `/end` that switch sampling on and off.
//!
//! Nothing here raises on a lost connection. Failures are logged and counted
//! in the session [`ErrorCounter`], and the caller decides what to do.

use crate::protocol::parse_frame;
use futures::StreamExt;
use hyper::client::HttpConnector;
use hyper::{Client, StatusCode, Uri};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use wadxl_core::{ErrorCounter, SampleBuffer};

/// Default WebSocket stream port.
pub const DEFAULT_STREAM_PORT: u16 = 81;

/// Default HTTP control port.
pub const DEFAULT_CONTROL_PORT: u16 = 80;

/// Default bound on waiting for the stream to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on a control request.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on joining the receive task at close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Network location and timing of one peripheral.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Peripheral host name or address
    pub host: String,
    /// WebSocket stream port
    pub stream_port: u16,
    /// HTTP control port
    pub control_port: u16,
    /// How long `connect` waits for the stream to open
    pub connect_timeout: Duration,
    /// How long a control request may take
    pub control_timeout: Duration,
    /// How long `close` waits for the receive task
    pub close_timeout: Duration,
}

impl SessionSettings {
    /// Settings with default ports and timeouts.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            stream_port: DEFAULT_STREAM_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// `ws://` URL of the sample stream.
    pub fn stream_url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.stream_port)
    }

    /// `http://` URL of a control endpoint.
    pub fn control_url(&self, endpoint: ControlEndpoint) -> String {
        format!("http://{}:{}/{}", self.host, self.control_port, endpoint)
    }
}

/// Control requests understood by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEndpoint {
    /// Begin sampling
    Start,
    /// Stop sampling
    End,
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEndpoint::Start => write!(f, "start"),
            ControlEndpoint::End => write!(f, "end"),
        }
    }
}

/// Result of a control request. Never an error: transport failures are
/// reported as `success == false` with the failure text as `body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    /// `true` only for HTTP 200
    pub success: bool,
    /// Response body, or the failure description
    pub body: String,
}

/// State of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Handshake in progress
    Connecting,
    /// Stream open and being read
    Open,
    /// Never opened, closed by either side, or failed
    Closed,
}

struct StreamTask {
    state: watch::Receiver<LinkState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// One peripheral's stream connection and control channel.
pub struct NetworkSession {
    settings: SessionSettings,
    buffer: Arc<SampleBuffer>,
    errors: Arc<ErrorCounter>,
    http: Client<HttpConnector>,
    stream: Mutex<Option<StreamTask>>,
}

impl NetworkSession {
    /// Create a disconnected session writing into `buffer`.
    pub fn new(
        settings: SessionSettings,
        buffer: Arc<SampleBuffer>,
        errors: Arc<ErrorCounter>,
    ) -> Self {
        Self {
            settings,
            buffer,
            errors,
            http: Client::new(),
            stream: Mutex::new(None),
        }
    }

    /// Connection settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether the stream is currently open.
    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Open
    }

    /// Current stream state.
    pub fn link_state(&self) -> LinkState {
        self.stream
            .lock()
            .as_ref()
            .map_or(LinkState::Closed, |task| *task.state.borrow())
    }

    /// Open the sample stream on a background task.
    ///
    /// Waits up to the connect timeout for the stream to open. A timeout or a
    /// failed handshake is logged, not returned: the session carries on
    /// disconnected and simply receives no data. Any previous stream is
    /// superseded.
    pub async fn connect(&self) -> bool {
        let url = self.settings.stream_url();
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(run_stream(
            url.clone(),
            self.buffer.clone(),
            self.errors.clone(),
            state_tx,
            shutdown_rx,
        ));

        let previous = self.stream.lock().replace(StreamTask {
            state: state_rx.clone(),
            shutdown: Some(shutdown_tx),
            handle,
        });
        if let Some(stale) = previous {
            tracing::debug!("Superseding previous stream connection");
            stale.handle.abort();
        }

        let mut state_rx = state_rx;
        let wait = async move {
            state_rx
                .wait_for(|state| *state != LinkState::Connecting)
                .await
                .map(|state| *state)
        };
        match timeout(self.settings.connect_timeout, wait).await {
            Ok(Ok(LinkState::Open)) => true,
            Ok(_) => {
                tracing::error!(%url, "Couldn't connect to WS");
                false
            }
            Err(_) => {
                tracing::error!(%url, timeout = ?self.settings.connect_timeout, "Couldn't connect to WS");
                false
            }
        }
    }

    /// Close the stream and join its task within the close timeout.
    ///
    /// A receiver that does not stop in time is aborted.
    pub async fn close(&self) {
        let task = self.stream.lock().take();
        let Some(mut task) = task else {
            return;
        };
        if let Some(shutdown) = task.shutdown.take() {
            let _ = shutdown.send(());
        }
        if timeout(self.settings.close_timeout, &mut task.handle)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout = ?self.settings.close_timeout,
                "Stream receiver did not stop in time, aborting"
            );
            task.handle.abort();
        }
    }

    /// Issue a control request.
    pub async fn send_control(&self, endpoint: ControlEndpoint) -> ControlResponse {
        let url = self.settings.control_url(endpoint);
        let uri: Uri = match url.parse() {
            Ok(uri) => uri,
            Err(e) => return self.control_failure(&url, e.to_string()),
        };

        let request = async {
            let response = self.http.get(uri).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, String::from_utf8_lossy(&body).into_owned()))
        };

        match timeout(self.settings.control_timeout, request).await {
            Ok(Ok((status, body))) => {
                tracing::debug!(%url, %status, "Control request complete");
                ControlResponse {
                    success: status == StatusCode::OK,
                    body,
                }
            }
            Ok(Err(e)) => self.control_failure(&url, e.to_string()),
            Err(_) => self.control_failure(
                &url,
                format!("request timed out after {:?}", self.settings.control_timeout),
            ),
        }
    }

    fn control_failure(&self, url: &str, message: String) -> ControlResponse {
        tracing::error!(%url, error = %message, "HTTP request failed");
        self.errors.increment();
        ControlResponse {
            success: false,
            body: message,
        }
    }
}

impl Drop for NetworkSession {
    fn drop(&mut self) {
        if let Some(task) = self.stream.get_mut().take() {
            task.handle.abort();
        }
    }
}

/// Parse one inbound frame into the buffer, counting bad records.
pub fn ingest_frame(frame: &str, buffer: &SampleBuffer, errors: &ErrorCounter) -> usize {
    let parsed = parse_frame(frame);
    for err in &parsed.errors {
        tracing::error!(error = %err, "Error parsing WebSocket data");
        errors.increment();
    }
    let count = parsed.samples.len();
    if count > 0 {
        buffer.extend(parsed.samples);
    }
    count
}

async fn run_stream(
    url: String,
    buffer: Arc<SampleBuffer>,
    errors: Arc<ErrorCounter>,
    state: watch::Sender<LinkState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut shutdown => {
            state.send_replace(LinkState::Closed);
            return;
        }
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::error!(%url, error = %e, "WebSocket connection failed");
            errors.increment();
            state.send_replace(LinkState::Closed);
            return;
        }
    };

    state.send_replace(LinkState::Open);
    tracing::info!(%url, "WebSocket connected");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = ws.close(None).await {
                    tracing::debug!(error = %e, "WebSocket close handshake failed");
                }
                break;
            }
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    ingest_frame(&text, &buffer, &errors);
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        ingest_frame(text, &buffer, &errors);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error parsing WebSocket data");
                        errors.increment();
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket error");
                    errors.increment();
                    break;
                }
            }
        }
    }

    state.send_replace(LinkState::Closed);
    tracing::info!(%url, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let settings = SessionSettings::new("wadxl.local");
        assert_eq!(settings.stream_url(), "ws://wadxl.local:81/");
        assert_eq!(
            settings.control_url(ControlEndpoint::Start),
            "http://wadxl.local:80/start"
        );
        assert_eq!(
            settings.control_url(ControlEndpoint::End),
            "http://wadxl.local:80/end"
        );
    }

    #[test]
    fn test_ingest_short_frame_leaves_counter_untouched() {
        let buffer = SampleBuffer::new();
        let errors = ErrorCounter::new();

        assert_eq!(ingest_frame("1000000,100,200\n", &buffer, &errors), 0);
        assert!(buffer.is_empty());
        assert_eq!(errors.get(), 0);

        assert_eq!(ingest_frame("1000000,100,200,300\n", &buffer, &errors), 1);
        assert_eq!(
            buffer.drain_all(),
            vec![wadxl_core::RawSample {
                time: 1.0,
                x: 100,
                y: 200,
                z: 300
            }]
        );
        assert_eq!(errors.get(), 0);
    }

    #[test]
    fn test_ingest_counts_each_bad_record() {
        let buffer = SampleBuffer::new();
        let errors = ErrorCounter::new();
        ingest_frame("x,1,2,3\n1,2,3,4\n5,y,6,7\n", &buffer, &errors);
        assert_eq!(buffer.len(), 1);
        assert_eq!(errors.get(), 2);
    }

    #[tokio::test]
    async fn test_control_failure_is_reported_not_raised() {
        // Nothing listens on port 1 of the loopback interface
        let mut settings = SessionSettings::new("127.0.0.1");
        settings.control_port = 1;
        let errors = Arc::new(ErrorCounter::new());
        let session = NetworkSession::new(settings, Arc::new(SampleBuffer::new()), errors.clone());

        let response = session.send_control(ControlEndpoint::Start).await;
        assert!(!response.success);
        assert!(!response.body.is_empty());
        assert_eq!(errors.get(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_returns_promptly() {
        let mut settings = SessionSettings::new("127.0.0.1");
        settings.stream_port = 1;
        let session = NetworkSession::new(
            settings,
            Arc::new(SampleBuffer::new()),
            Arc::new(ErrorCounter::new()),
        );

        let started = std::time::Instant::now();
        assert!(!session.connect().await);
        assert!(started.elapsed() < DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(session.link_state(), LinkState::Closed);

        // Closing a dead session is harmless
        session.close().await;
        assert!(!session.is_connected());
    }
}
