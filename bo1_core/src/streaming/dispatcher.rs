//! Event dispatcher: typed subscription table and ordered delivery.

use bo1_core_types::EventType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::handler::{isolate, CallbackHandler, ChannelHandler, EventHandler};
use super::types::StreamEvent;
use crate::errors::CoreError;
use crate::sse::SseEvent;

/// Wildcard marker accepted by `EventKey::from(&str)`.
pub const WILDCARD: &str = "*";

/// Subscription key: one event type, or every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Type(EventType),
    Wildcard,
}

impl From<EventType> for EventKey {
    fn from(event_type: EventType) -> Self {
        EventKey::Type(event_type)
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        if name == WILDCARD {
            EventKey::Wildcard
        } else {
            EventKey::Type(EventType::from_wire(name))
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Type(event_type) => write!(f, "{}", event_type),
            EventKey::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// Decode a frame for dispatch; see [`StreamEvent::from_frame`].
///
/// Callers log and skip frames that fail to decode; the stream carries on.
pub fn decode_frame(frame: &SseEvent) -> Result<Option<StreamEvent>, CoreError> {
    StreamEvent::from_frame(frame)
}

/// Handle returned by `on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that returned normally.
    pub delivered: usize,
    /// Handlers that panicked.
    pub failed: usize,
    /// Handlers never called because delivery was stopped.
    pub skipped: usize,
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Routes events to type-specific subscribers, then wildcard subscribers.
///
/// The registry is only mutated by `on`/`off`. Dispatch works on a snapshot
/// taken before any handler runs, so a handler may subscribe or unsubscribe
/// without affecting the delivery in progress.
pub struct EventDispatcher {
    registry: RwLock<HashMap<EventKey, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a handler for `key`. Handlers for the same key run in
    /// registration order.
    pub fn on(&self, key: impl Into<EventKey>, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .write()
            .entry(key.into())
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Subscribe a closure.
    pub fn on_fn<F>(&self, key: impl Into<EventKey>, callback: F) -> SubscriptionId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.on(key, Arc::new(CallbackHandler::new(callback)))
    }

    /// Subscribe a handler to every event.
    pub fn on_any(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.on(EventKey::Wildcard, handler)
    }

    /// Subscribe a channel; await events with `recv().await`.
    pub fn subscribe_channel(
        &self,
        key: impl Into<EventKey>,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<StreamEvent>) {
        let (handler, receiver) = ChannelHandler::channel();
        (self.on(key, Arc::new(handler)), receiver)
    }

    /// Remove a subscription. Returns false if it was not registered under `key`.
    pub fn off(&self, key: impl Into<EventKey>, id: SubscriptionId) -> bool {
        self.remove_first(&key.into(), |sub| sub.id == id)
    }

    /// Remove the first registration of `handler` under `key`.
    pub fn off_handler(&self, key: impl Into<EventKey>, handler: &Arc<dyn EventHandler>) -> bool {
        self.remove_first(&key.into(), |sub| Arc::ptr_eq(&sub.handler, handler))
    }

    fn remove_first<P>(&self, key: &EventKey, predicate: P) -> bool
    where
        P: Fn(&Subscription) -> bool,
    {
        let mut registry = self.registry.write();
        let Some(subs) = registry.get_mut(key) else {
            return false;
        };
        let Some(pos) = subs.iter().position(predicate) else {
            return false;
        };
        subs.remove(pos);
        if subs.is_empty() {
            registry.remove(key);
        }
        true
    }

    /// Number of handlers registered under `key`.
    pub fn handler_count(&self, key: impl Into<EventKey>) -> usize {
        self.registry
            .read()
            .get(&key.into())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.registry.write().clear();
    }

    /// Deliver `event` to its type's handlers, then to wildcard handlers.
    ///
    /// Each handler runs in isolation: a panic is logged and counted, and the
    /// remaining handlers still run.
    pub fn dispatch(&self, event: &StreamEvent) -> DispatchReport {
        self.dispatch_while(event, || true)
    }

    /// Like [`dispatch`](Self::dispatch), but checks `keep_going` before each
    /// handler and stops at the first `false`.
    ///
    /// The connection manager uses this so a handler that closes the client
    /// also stops the rest of the delivery in progress.
    pub fn dispatch_while<F>(&self, event: &StreamEvent, keep_going: F) -> DispatchReport
    where
        F: Fn() -> bool,
    {
        let handlers = self.snapshot(&event.event_type);
        let mut report = DispatchReport::default();

        for (index, handler) in handlers.iter().enumerate() {
            if !keep_going() {
                report.skipped = handlers.len() - index;
                break;
            }
            if isolate(event.event_type.as_str(), || handler.handle(event)) {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    fn snapshot(&self, event_type: &EventType) -> Vec<Arc<dyn EventHandler>> {
        let registry = self.registry.read();
        let specific = registry.get(&EventKey::Type(event_type.clone()));
        let wildcard = registry.get(&EventKey::Wildcard);

        specific
            .into_iter()
            .chain(wildcard)
            .flatten()
            .map(|sub| Arc::clone(&sub.handler))
            .collect()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
