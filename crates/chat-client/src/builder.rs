//! Client construction

use std::sync::Arc;

use chat_cache::{EntityCache, DEFAULT_MESSAGE_CAPACITY};
use chat_common::{ClientConfig, ClientResult};
use chat_gateway::{ErrorHook, EventQueue, GatewaySession, ListenerRegistry, PacketDispatcher};
use chat_rest::{HttpTransport, RestExecutor};

use crate::client::Client;

/// Builder for [`Client`]
///
/// ```ignore
/// let client = ClientBuilder::new(ClientConfig::from_env()?)
///     .message_capacity(200)
///     .build()?;
/// client.register_listener(EventType::MessageCreate, Scope::Global, listener);
/// client.connect()?;
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    error_hook: Option<ErrorHook>,
    message_capacity: usize,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            error_hook: None,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }

    /// Replace the `reqwest` transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Receives listener errors and panics; the default logs them
    pub fn error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Messages kept per channel; 0 disables message caching
    pub fn message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity;
        self
    }

    /// Assemble the client without touching the network
    pub fn build(self) -> ClientResult<Client> {
        let rest = match self.transport {
            Some(transport) => RestExecutor::new(&self.config, transport),
            None => RestExecutor::from_config(&self.config)?,
        };

        let workers = self.config.events.workers;
        let queue = match self.error_hook {
            Some(hook) => EventQueue::with_error_hook(workers, hook),
            None => EventQueue::new(workers),
        };

        let (cache, writer) = EntityCache::with_message_capacity(self.message_capacity);
        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = PacketDispatcher::new(writer, Arc::clone(&registry), queue.clone());

        let config = Arc::new(self.config);
        let (session, handle) = GatewaySession::new(Arc::clone(&config), dispatcher);

        tracing::debug!(
            shard = config.shard.id,
            shard_count = config.shard.count,
            workers,
            "Client built"
        );

        Ok(Client::from_parts(config, cache, Arc::new(rest), registry, queue, session, handle))
    }
}
