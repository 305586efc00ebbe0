//! Client facade

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError};

use chat_cache::{CachedEntity, EntityCache, EntityKind};
use chat_common::{ClientConfig, ClientError, ClientResult};
use chat_core::Snowflake;
use chat_gateway::{
    protocol::PresenceUpdatePayload, EventQueue, EventType, GatewayError, GatewaySession, Listener,
    ListenerHandle, ListenerRegistry, Scope, SessionHandle, SessionState,
};
use chat_rest::{RestExecutor, RestRequest, RestResponse};

use crate::builder::ClientBuilder;

/// How long [`Client::shutdown`] waits for the session task to close the socket
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One gateway session plus the REST executor, sharing a single entity cache
///
/// Listeners may be registered before or after [`Client::connect`]; register
/// before connecting to observe the initial `Ready`.
pub struct Client {
    config: Arc<ClientConfig>,
    cache: EntityCache,
    rest: Arc<RestExecutor>,
    registry: Arc<ListenerRegistry>,
    queue: EventQueue,
    session: SessionHandle,
    pending: Mutex<Option<GatewaySession>>,
    exit: Arc<SessionExit>,
    abort: Mutex<Option<AbortHandle>>,
}

/// Completion of the session task, observable by any number of waiters
struct SessionExit {
    done: watch::Sender<bool>,
    result: Mutex<Option<ClientResult<()>>>,
}

impl SessionExit {
    fn new() -> Self {
        Self {
            done: watch::Sender::new(false),
            result: Mutex::new(None),
        }
    }

    fn finish(&self, result: ClientResult<()>) {
        *self.result.lock() = Some(result);
        self.done.send_replace(true);
    }

    async fn wait(&self) {
        let mut done = self.done.subscribe();
        // The sender lives in `self`, so this only ends once done is set
        let _ = done.wait_for(|done| *done).await;
    }
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: Arc<ClientConfig>,
        cache: EntityCache,
        rest: Arc<RestExecutor>,
        registry: Arc<ListenerRegistry>,
        queue: EventQueue,
        session: GatewaySession,
        handle: SessionHandle,
    ) -> Self {
        Self {
            config,
            cache,
            rest,
            registry,
            queue,
            session: handle,
            pending: Mutex::new(Some(session)),
            exit: Arc::new(SessionExit::new()),
            abort: Mutex::new(None),
        }
    }

    /// Start the gateway session in the background
    ///
    /// Fails with `ClientClosed` when called twice or after shutdown.
    pub fn connect(&self) -> ClientResult<()> {
        if self.session.is_shutdown() {
            return Err(ClientError::ClientClosed);
        }
        let Some(session) = self.pending.lock().take() else {
            return Err(ClientError::ClientClosed);
        };
        tracing::info!(gateway = %self.config.gateway_url, "Starting gateway session");
        let task = tokio::spawn(session.run());
        *self.abort.lock() = Some(task.abort_handle());

        let exit = Arc::clone(&self.exit);
        tokio::spawn(async move {
            exit.finish(flatten_join(task.await));
        });
        Ok(())
    }

    /// Wait for the session to end (fatal error or shutdown)
    ///
    /// Any number of callers may wait at once, and dropping a pending wait
    /// has no effect on the session. The session's own error goes to the
    /// first waiter to return; later ones see `Ok`. Returns at once if the
    /// client never connected.
    pub async fn wait(&self) -> ClientResult<()> {
        if !self.started() {
            return Ok(());
        }
        self.exit.wait().await;
        self.exit.result.lock().take().unwrap_or(Ok(()))
    }

    /// Close the socket with 1000, drop undelivered events, and reject new REST calls
    pub async fn shutdown(&self) -> ClientResult<()> {
        tracing::info!("Shutting down client");
        self.session.shutdown();
        self.queue.shutdown();
        self.rest.close();
        self.pending.lock().take();

        if !self.started() {
            return Ok(());
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, self.exit.wait()).await.is_err() {
            tracing::warn!("Session did not stop in time, aborting");
            if let Some(abort) = self.abort.lock().as_ref() {
                abort.abort();
            }
            self.exit.wait().await;
        }
        self.exit.result.lock().take().unwrap_or(Ok(()))
    }

    /// Set the client's presence; kept across reconnects
    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> ClientResult<()> {
        self.session.update_presence(presence).await.map_err(ClientError::from)
    }

    pub fn register_listener(&self, event_type: EventType, scope: Scope, listener: Listener) -> ListenerHandle {
        self.registry.register(event_type, scope, listener)
    }

    /// `false` if the handle was already removed
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        self.registry.unregister(handle)
    }

    pub fn get_cached_entity(&self, kind: EntityKind, id: Snowflake) -> Option<CachedEntity> {
        self.cache.get(kind, id)
    }

    /// Run one REST call through the rate limiter
    ///
    /// Internal retries are invisible; the returned future resolves once.
    pub async fn submit_rest_request(&self, request: RestRequest) -> ClientResult<RestResponse> {
        self.rest.execute(request).await
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn rest(&self) -> &Arc<RestExecutor> {
        &self.rest
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.session.latency()
    }

    fn started(&self) -> bool {
        self.abort.lock().is_some()
    }
}

fn flatten_join(joined: Result<Result<(), GatewayError>, JoinError>) -> ClientResult<()> {
    match joined {
        Ok(result) => result.map_err(ClientError::from),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(ClientError::network(format!("session task failed: {e}"), false)),
    }
}
