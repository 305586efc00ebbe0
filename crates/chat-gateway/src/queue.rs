//! Event dispatch queue
//!
//! Each ordering key owns a FIFO lane drained by at most one task at a time,
//! so events sharing a key reach listeners in production order. Lanes for
//! different keys drain concurrently, bounded by a worker semaphore.
//! Listener errors and panics are caught per callback and handed to the
//! error hook; delivery continues with the next listener.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::events::{Event, EventType, Listener, OrderingKey};

const SLOW_LISTENER_DEBUG: Duration = Duration::from_millis(500);
const SLOW_LISTENER_WARN: Duration = Duration::from_secs(10);

/// What went wrong inside a listener
#[derive(Debug)]
pub enum FailureCause {
    Error(anyhow::Error),
    Panic(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e:#}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

#[derive(Debug)]
pub struct ListenerFailure {
    pub event_type: EventType,
    pub ordering_key: OrderingKey,
    pub cause: FailureCause,
}

/// Receives every listener failure
pub type ErrorHook = Arc<dyn Fn(ListenerFailure) + Send + Sync>;

fn log_failure(failure: ListenerFailure) {
    tracing::error!(
        event_type = %failure.event_type,
        ordering_key = %failure.ordering_key,
        error = %failure.cause,
        "Unhandled error in event listener"
    );
}

struct Job {
    event: Arc<Event>,
    listeners: Vec<Listener>,
}

struct Inner {
    /// A key is present while its lane has a drain task
    lanes: Mutex<HashMap<OrderingKey, VecDeque<Job>>>,
    workers: Arc<Semaphore>,
    closed: AtomicBool,
    error_hook: ErrorHook,
}

#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<Inner>,
}

impl EventQueue {
    pub fn new(workers: usize) -> Self {
        Self::with_error_hook(workers, Arc::new(log_failure))
    }

    pub fn with_error_hook(workers: usize, error_hook: ErrorHook) -> Self {
        Self {
            inner: Arc::new(Inner {
                lanes: Mutex::new(HashMap::new()),
                workers: Arc::new(Semaphore::new(workers.max(1))),
                closed: AtomicBool::new(false),
                error_hook,
            }),
        }
    }

    /// Queue `event` for `listeners` behind earlier events with the same key
    ///
    /// Must be called from within a tokio runtime. Dropped silently once the
    /// queue is shut down.
    pub fn dispatch_event(&self, key: OrderingKey, listeners: Vec<Listener>, event: Arc<Event>) {
        if listeners.is_empty() {
            return;
        }
        if self.is_closed() {
            tracing::trace!(event_type = %event.event_type(), "Queue closed, event dropped");
            return;
        }

        let job = Job { event, listeners };
        let mut lanes = self.inner.lanes.lock();
        match lanes.get_mut(&key) {
            Some(lane) => lane.push_back(job),
            None => {
                lanes.insert(key, VecDeque::from([job]));
                tokio::spawn(drain(Arc::clone(&self.inner), key));
            }
        }
    }

    /// Discard queued events and refuse new ones
    ///
    /// Listeners already running are allowed to finish.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let discarded: usize = {
            let mut lanes = self.inner.lanes.lock();
            let count = lanes.values().map(VecDeque::len).sum();
            lanes.clear();
            count
        };
        self.inner.workers.close();
        tracing::debug!(discarded, "Event queue shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Events waiting for their turn, excluding those being delivered
    pub fn pending(&self) -> usize {
        self.inner.lanes.lock().values().map(VecDeque::len).sum()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn drain(inner: Arc<Inner>, key: OrderingKey) {
    loop {
        let job = {
            let mut lanes = inner.lanes.lock();
            let Some(lane) = lanes.get_mut(&key) else {
                return;
            };
            match lane.pop_front() {
                Some(job) => job,
                None => {
                    lanes.remove(&key);
                    return;
                }
            }
        };

        let Ok(_permit) = inner.workers.acquire().await else {
            return;
        };
        if inner.closed.load(Ordering::Acquire) {
            return;
        }

        for listener in &job.listeners {
            if let Err(cause) = run_listener(listener, &job.event, key).await {
                (inner.error_hook)(ListenerFailure {
                    event_type: job.event.event_type(),
                    ordering_key: key,
                    cause,
                });
            }
        }
    }
}

async fn run_listener(
    listener: &Listener,
    event: &Arc<Event>,
    key: OrderingKey,
) -> Result<(), FailureCause> {
    let started = Instant::now();
    let invocation = AssertUnwindSafe(async { listener.invoke(Arc::clone(event)).await }).catch_unwind();
    tokio::pin!(invocation);

    let outcome = tokio::select! {
        outcome = &mut invocation => outcome,
        () = tokio::time::sleep(SLOW_LISTENER_WARN) => {
            tracing::warn!(
                event_type = %event.event_type(),
                ordering_key = %key,
                "Listener has been running for over {}s, events for this key are queued behind it",
                SLOW_LISTENER_WARN.as_secs()
            );
            invocation.await
        }
    };

    let elapsed = started.elapsed();
    if elapsed >= SLOW_LISTENER_DEBUG {
        tracing::debug!(
            event_type = %event.event_type(),
            ordering_key = %key,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow listener"
        );
    }

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(FailureCause::Error(e)),
        Err(panic) => Err(FailureCause::Panic(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
