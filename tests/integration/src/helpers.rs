//! Test helpers for integration tests
//!
//! [`MockGateway`] accepts real WebSocket connections from the client and
//! hands each one to the test as a [`GatewayConn`]. [`MockRest`] is an axum
//! app replaying scripted responses and recording what it received.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use chat_client::{Client, ClientConfig, Event, EventType, Listener, Scope};
use chat_gateway::protocol::{GatewayMessage, OpCode};

/// Upper bound for any single wait in a test
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub const TEST_TOKEN: &str = "test-token";

/// Client configuration pointing at the mock servers, with fast backoff
pub fn test_config(gateway_url: &str, api_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(format!("Bot {TEST_TOKEN}"))
        .with_gateway_url(gateway_url)
        .with_api_base_url(api_url);
    config.gateway.backoff_base_ms = 10;
    config.gateway.backoff_max_ms = 50;
    config.gateway.hello_timeout_ms = 2_000;
    config.gateway.identify_interval_ms = 100;
    config.rest.max_retries = 2;
    config.events.workers = 4;
    config
}

// ============================================================================
// Mock gateway
// ============================================================================

pub struct MockGateway {
    addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<GatewayConn>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, incoming) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(GatewayConn { ws }).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            addr,
            incoming,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next client connection
    pub async fn accept(&mut self) -> Result<GatewayConn> {
        tokio::time::timeout(TIMEOUT, self.incoming.recv())
            .await
            .context("no connection within timeout")?
            .context("mock gateway stopped")
    }
}

/// What the client sent
#[derive(Debug)]
pub enum Frame {
    Payload(GatewayMessage),
    Close(Option<u16>),
}

/// Server side of one client socket
pub struct GatewayConn {
    ws: WebSocketStream<TcpStream>,
}

impl GatewayConn {
    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.ws.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&GatewayMessage::hello(heartbeat_interval_ms)).await
    }

    pub async fn dispatch(&mut self, packet_type: &str, seq: u64, data: Value) -> Result<()> {
        self.send(&GatewayMessage::dispatch(packet_type, seq, data)).await
    }

    /// Close with `code`; the client sees it as a normal close frame
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.ws.close(Some(frame)).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Frame> {
        loop {
            let next = tokio::time::timeout(TIMEOUT, self.ws.next())
                .await
                .context("no frame within timeout")?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Frame::Payload(GatewayMessage::from_json(&text)?)),
                Some(Ok(Message::Close(frame))) => return Ok(Frame::Close(frame.map(|f| u16::from(f.code)))),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Frame::Close(None)),
            }
        }
    }

    /// Next payload with `op`, skipping anything else
    pub async fn recv_op(&mut self, op: OpCode) -> Result<GatewayMessage> {
        loop {
            match self.recv().await? {
                Frame::Payload(message) if message.op == op => return Ok(message),
                Frame::Payload(_) => {}
                Frame::Close(code) => bail!("socket closed ({code:?}) while waiting for {op}"),
            }
        }
    }

    /// Read until the client closes, answering nothing
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let Frame::Close(code) = self.recv().await? {
                return Ok(code);
            }
        }
    }

    /// Hello, wait for identify, then READY for `servers`
    pub async fn handshake(&mut self, session_id: &str, servers: &[u64]) -> Result<GatewayMessage> {
        self.hello(45_000).await?;
        let identify = self.recv_op(OpCode::Identify).await?;
        self.dispatch("READY", 1, crate::fixtures::ready(session_id, servers))
            .await?;
        Ok(identify)
    }
}

// ============================================================================
// Mock REST
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptedResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
struct RestState {
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockRest {
    addr: SocketAddr,
    state: Arc<RestState>,
    _handle: JoinHandle<()>,
}

impl MockRest {
    pub async fn start(script: Vec<ScriptedResponse>) -> Result<Self> {
        let state = Arc::new(RestState {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback(respond).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Versioned API base the client should use
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v10", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

async fn respond(State(state): State<Arc<RestState>>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    state.requests.lock().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        at: Instant::now(),
    });

    let Some(scripted) = state.script.lock().pop_front() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "script exhausted").into_response();
    };

    let status = StatusCode::from_u16(scripted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, scripted.body).into_response();
    let out = response.headers_mut();
    out.insert("content-type", HeaderValue::from_static("application/json"));
    for (name, value) in &scripted.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            out.insert(name, value);
        }
    }
    response
}

// ============================================================================
// Event capture
// ============================================================================

/// Collects events delivered to listeners
pub struct EventSink {
    rx: mpsc::UnboundedReceiver<Arc<Event>>,
    tx: mpsc::UnboundedSender<Arc<Event>>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Register a listener on `client` forwarding into this sink
    pub fn listen(&self, client: &Client, event_type: EventType, scope: Scope) {
        let tx = self.tx.clone();
        client.register_listener(
            event_type,
            scope,
            Listener::new(move |event| {
                let tx = tx.clone();
                async move {
                    tx.send(event).ok();
                    Ok(())
                }
            }),
        );
    }

    pub async fn next(&mut self) -> Result<Arc<Event>> {
        tokio::time::timeout(TIMEOUT, self.rx.recv())
            .await
            .context("no event within timeout")?
            .context("sink closed")
    }

    /// Next event of `event_type`, skipping others
    pub async fn next_of(&mut self, event_type: EventType) -> Result<Arc<Event>> {
        loop {
            let event = self.next().await?;
            if event.event_type() == event_type {
                return Ok(event);
            }
        }
    }

    /// Whatever arrives within `window`
    pub async fn drain_for(&mut self, window: Duration) -> Vec<Arc<Event>> {
        let mut events = Vec::new();
        let deadline = Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            events.push(event);
        }
        events
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `check` until it holds
pub async fn wait_until(mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + TIMEOUT;
    while !check() {
        if Instant::now() >= deadline {
            bail!("condition not met within timeout");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
