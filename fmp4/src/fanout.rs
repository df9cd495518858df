//! Fan-out of init segments and fragments to independent subscribers.
//!
//! Every subscriber owns a bounded queue, so a stalled consumer only affects itself.  What happens
//! when a queue is full is decided per subscriber by its `BackpressurePolicy`.  The registry is
//! the only shared piece of the pipeline and can be cloned freely.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use rml_fmp4::fanout::{FragmentRegistry, FragmentSink, QueueConfig};
//!
//! let registry = FragmentRegistry::new();
//! registry.on_init_segment("live/stream", Bytes::from_static(b"init"));
//!
//! let subscription = registry.subscribe("live/stream", QueueConfig::new());
//! registry.on_fragment("live/stream", Bytes::from_static(b"fragment"));
//!
//! assert_eq!(subscription.recv().unwrap(), Bytes::from_static(b"init"));
//! assert_eq!(subscription.recv().unwrap(), Bytes::from_static(b"fragment"));
//! ```

use crate::errors::FanoutError;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives the output of a fragment builder
pub trait FragmentSink {
    fn on_init_segment(&self, stream_key: &str, init_segment: Bytes);
    fn on_fragment(&self, stream_key: &str, fragment: Bytes);
}

/// What a publisher does when a subscriber's queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Evict the oldest queued item to make room
    DropOldest,

    /// Discard the item being published
    DropNewest,

    /// Wait until the subscriber makes room or goes away
    BlockProducer,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of queued items, never less than 1
    pub capacity: usize,
    pub policy: BackpressurePolicy,
}

impl QueueConfig {
    pub fn new() -> QueueConfig {
        QueueConfig {
            capacity: 64,
            policy: BackpressurePolicy::DropOldest,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig::new()
    }
}

struct QueueState {
    /// Held apart from `items` so neither capacity nor eviction ever touches it
    pending_init: Option<Bytes>,
    items: VecDeque<Bytes>,
    closed: bool,
    dropped: u64,
}

impl QueueState {
    fn pop(&mut self) -> Option<Bytes> {
        self.pending_init.take().or_else(|| self.items.pop_front())
    }
}

struct SubscriberQueue {
    id: u64,
    capacity: usize,
    policy: BackpressurePolicy,
    state: Mutex<QueueState>,
    available: Condvar,
    space: Condvar,
}

impl SubscriberQueue {
    fn new(id: u64, config: &QueueConfig) -> SubscriberQueue {
        SubscriberQueue {
            id,
            capacity: config.capacity.max(1),
            policy: config.policy,
            state: Mutex::new(QueueState {
                pending_init: None,
                items: VecDeque::new(),
                closed: false,
                dropped: 0,
            }),
            available: Condvar::new(),
            space: Condvar::new(),
        }
    }

    fn offer(&self, stream_key: &str, item: Bytes) {
        let mut state = self.state.lock();
        while !state.closed && state.items.len() >= self.capacity {
            match self.policy {
                BackpressurePolicy::DropOldest => {
                    state.items.pop_front();
                    state.dropped += 1;
                    warn!(stream_key, subscriber = self.id, dropped = state.dropped, "Subscriber queue full, dropped oldest item");
                }

                BackpressurePolicy::DropNewest => {
                    state.dropped += 1;
                    warn!(stream_key, subscriber = self.id, dropped = state.dropped, "Subscriber queue full, dropped newest item");
                    return;
                }

                BackpressurePolicy::BlockProducer => self.space.wait(&mut state),
            }
        }

        if state.closed {
            return;
        }

        state.items.push_back(item);
        self.available.notify_one();
    }

    fn offer_init_segment(&self, init_segment: Bytes) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.pending_init = Some(init_segment);
        self.available.notify_one();
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
        self.space.notify_all();
    }
}

type DetachHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct StreamEntry {
    init_segment: Option<Bytes>,
    subscribers: Vec<Arc<SubscriberQueue>>,
}

struct RegistryInner {
    streams: Mutex<HashMap<String, StreamEntry>>,
    detach_handler: RwLock<Option<DetachHandler>>,
    next_subscriber_id: AtomicU64,
}

impl RegistryInner {
    fn detach(&self, stream_key: &str, queue: &Arc<SubscriberQueue>) {
        let was_last = {
            let mut streams = self.streams.lock();
            let (was_last, unused) = match streams.get_mut(stream_key) {
                Some(entry) => {
                    let count = entry.subscribers.len();
                    entry.subscribers.retain(|other| !Arc::ptr_eq(other, queue));
                    let was_last = count != entry.subscribers.len() && entry.subscribers.is_empty();
                    (was_last, was_last && entry.init_segment.is_none())
                }

                None => (false, false),
            };

            // Entries created by subscribers of streams that never published are not kept
            if unused {
                streams.remove(stream_key);
            }

            was_last
        };

        queue.close();
        debug!(stream_key, subscriber = queue.id, "Subscriber detached");

        if was_last {
            info!(stream_key, "Last subscriber detached");
            let handler = self.detach_handler.read().clone();
            if let Some(handler) = handler {
                handler(stream_key);
            }
        }
    }
}

/// Keeps the subscribers of every stream along with the stream's init segment
#[derive(Clone)]
pub struct FragmentRegistry {
    inner: Arc<RegistryInner>,
}

impl FragmentRegistry {
    pub fn new() -> FragmentRegistry {
        FragmentRegistry {
            inner: Arc::new(RegistryInner {
                streams: Mutex::new(HashMap::new()),
                detach_handler: RwLock::new(None),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    /// Sets the function called with the stream key whenever the last subscriber of a stream
    /// goes away
    pub fn set_detach_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.detach_handler.write() = Some(Arc::new(handler));
    }

    /// Adds a subscriber.  If the stream already produced its init segment it is the first
    /// item the subscriber receives.
    pub fn subscribe(&self, stream_key: &str, config: QueueConfig) -> Subscription {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(id, &config));

        {
            let mut streams = self.inner.streams.lock();
            let entry = streams.entry(stream_key.to_string()).or_insert_with(StreamEntry::default);
            if let Some(ref init_segment) = entry.init_segment {
                queue.state.lock().pending_init = Some(init_segment.clone());
            }

            entry.subscribers.push(queue.clone());
        }

        debug!(stream_key, subscriber = id, capacity = queue.capacity, policy = ?queue.policy, "Subscriber attached");
        Subscription {
            registry: self.inner.clone(),
            stream_key: stream_key.to_string(),
            queue,
        }
    }

    pub fn subscriber_count(&self, stream_key: &str) -> usize {
        self.inner
            .streams
            .lock()
            .get(stream_key)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    pub fn init_segment(&self, stream_key: &str) -> Option<Bytes> {
        self.inner
            .streams
            .lock()
            .get(stream_key)
            .and_then(|entry| entry.init_segment.clone())
    }

    /// Forgets the stream and closes every subscription to it.  Subscribers can still drain
    /// what was already queued.
    pub fn close_stream(&self, stream_key: &str) {
        let entry = self.inner.streams.lock().remove(stream_key);
        if let Some(entry) = entry {
            info!(stream_key, subscribers = entry.subscribers.len(), "Stream closed");
            for queue in entry.subscribers {
                queue.close();
            }
        }
    }

    fn subscribers(&self, stream_key: &str) -> Vec<Arc<SubscriberQueue>> {
        self.inner
            .streams
            .lock()
            .get(stream_key)
            .map(|entry| entry.subscribers.clone())
            .unwrap_or_default()
    }
}

impl Default for FragmentRegistry {
    fn default() -> Self {
        FragmentRegistry::new()
    }
}

impl FragmentSink for FragmentRegistry {
    fn on_init_segment(&self, stream_key: &str, init_segment: Bytes) {
        let subscribers = {
            let mut streams = self.inner.streams.lock();
            let entry = streams.entry(stream_key.to_string()).or_insert_with(StreamEntry::default);
            entry.init_segment = Some(init_segment.clone());
            entry.subscribers.clone()
        };

        for queue in subscribers {
            queue.offer_init_segment(init_segment.clone());
        }
    }

    fn on_fragment(&self, stream_key: &str, fragment: Bytes) {
        // Queues are fed outside of the registry lock so a blocking policy only stalls the
        // publisher, never other subscribers or subscribe calls
        for queue in self.subscribers(stream_key) {
            queue.offer(stream_key, fragment.clone());
        }
    }
}

/// Consumer side of a subscriber queue.  Dropping it detaches the subscriber.
pub struct Subscription {
    registry: Arc<RegistryInner>,
    stream_key: String,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Blocks until an item is available.  Fails once the subscription is closed and drained.
    pub fn recv(&self) -> Result<Bytes, FanoutError> {
        let mut state = self.queue.state.lock();
        loop {
            if let Some(item) = state.pop() {
                self.queue.space.notify_one();
                return Ok(item);
            }

            if state.closed {
                return Err(FanoutError::Closed);
            }

            self.queue.available.wait(&mut state);
        }
    }

    pub fn try_recv(&self) -> Result<Option<Bytes>, FanoutError> {
        let mut state = self.queue.state.lock();
        match state.pop() {
            Some(item) => {
                self.queue.space.notify_one();
                Ok(Some(item))
            }

            None if state.closed => Err(FanoutError::Closed),
            None => Ok(None),
        }
    }

    /// Like `recv()` but gives up after `timeout`, returning `Ok(None)`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Bytes>, FanoutError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.queue.state.lock();
        loop {
            if let Some(item) = state.pop() {
                self.queue.space.notify_one();
                return Ok(Some(item));
            }

            if state.closed {
                return Err(FanoutError::Closed);
            }

            if self.queue.available.wait_until(&mut state, deadline).timed_out() {
                let item = state.pop();
                if item.is_some() {
                    self.queue.space.notify_one();
                }

                return Ok(item);
            }
        }
    }

    /// Number of items discarded because this subscriber's queue was full
    pub fn dropped_count(&self) -> u64 {
        self.queue.state.lock().dropped
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.detach(&self.stream_key, &self.queue);
    }
}
