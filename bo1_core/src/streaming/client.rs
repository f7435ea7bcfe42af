//! Connection manager for session event streams.
//!
//! A [`StreamClient`] owns at most one live stream. `connect` spawns a driver
//! task that opens the transport, decodes frames, runs gap detection and
//! dispatches events, reconnecting with backoff after transport failures.
//!
//! Delivery is fenced by a generation counter behind a re-entrant gate. The
//! driver holds the gate while it dispatches an event, changes state or fires
//! a hook, and does nothing once its generation is stale. `close` and
//! `connect` bump the generation under the same gate, so when `close`
//! returns no further callback can fire for the old connection. Re-entrancy
//! lets handlers call `close` from inside a dispatch.

use futures_util::StreamExt;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use bo1_core_types::SCHEMA_VERSION_FIELD;

use super::config::StreamClientConfig;
use super::dispatcher::{decode_frame, EventDispatcher, EventKey, SubscriptionId};
use super::gap::{GapDetector, SequenceCheck};
use super::hooks::{ConnectionInfo, LifecycleHooks};
use super::types::StreamEvent;
use super::version::{check_event_version, check_server_version};
use crate::errors::{CoreError, CoreResult};
use crate::sse::{EventTransport, HttpTransport, OpenedStream, SseEvent, SseStream, StreamRequest};
use crate::urls::session_stream_url;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Initial state, and the state after `close` or a completed stream.
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff delay before the next attempt.
    Retrying,
    /// Gave up: reconnect disabled, non-retryable error, or attempts exhausted.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between the client and its driver task.
struct Shared {
    state: RwLock<ConnectionState>,
    session_id: RwLock<Option<String>>,
    transport_open: AtomicBool,
    gap: Mutex<GapDetector>,
    gate: ReentrantMutex<Cell<u64>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            session_id: RwLock::new(None),
            transport_open: AtomicBool::new(false),
            gap: Mutex::new(GapDetector::new()),
            gate: ReentrantMutex::new(Cell::new(0)),
        }
    }

    /// Run `f` under the gate if `generation` is still the live one.
    fn with_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let gate = self.gate.lock();
        if gate.get() != generation {
            return None;
        }
        Some(f())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.gate.lock().get() == generation
    }

    /// Invalidate the running generation and return the next one.
    fn advance(&self) -> u64 {
        let gate = self.gate.lock();
        let next = gate.get().wrapping_add(1);
        gate.set(next);
        next
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

struct ActiveConnection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveConnection {
    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Reconnecting event-stream client for one deliberation session at a time.
///
/// # Example
///
/// ```ignore
/// let client = StreamClient::new(StreamClientConfig::from_env()?, LifecycleHooks::default())?;
/// let (_, mut events) = client.subscribe_channel(EventKey::Wildcard);
/// client.connect("sess-42")?;
/// while let Some(event) = events.recv().await {
///     println!("{} {:?}", event.event_type, event.sequence);
/// }
/// ```
pub struct StreamClient {
    config: StreamClientConfig,
    hooks: LifecycleHooks,
    transport: Arc<dyn EventTransport>,
    dispatcher: Arc<EventDispatcher>,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveConnection>>,
}

impl StreamClient {
    /// Create a client that streams over HTTP.
    pub fn new(config: StreamClientConfig, hooks: LifecycleHooks) -> CoreResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, hooks, Arc::new(transport))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: StreamClientConfig,
        hooks: LifecycleHooks,
        transport: Arc<dyn EventTransport>,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hooks,
            transport,
            dispatcher: Arc::new(EventDispatcher::new()),
            shared: Arc::new(Shared::new()),
            active: Mutex::new(None),
        })
    }

    /// Open the stream for `session_id`, replacing any current connection.
    ///
    /// Must be called from within a tokio runtime; the connection runs on a
    /// spawned task. A replaced connection is torn down without `on_close`.
    pub fn connect(&self, session_id: impl Into<String>) -> CoreResult<()> {
        let session_id = session_id.into();
        let url = session_stream_url(&self.config.base_url, &session_id)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CoreError::Internal("connect must be called from within a tokio runtime".to_string())
        })?;

        let previous = self.active.lock().take();
        let generation = self.shared.advance();
        if let Some(previous) = previous {
            debug!(session_id = %session_id, "replacing active event stream");
            previous.stop();
        }

        *self.shared.session_id.write() = Some(session_id.clone());
        self.shared.transport_open.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connecting);
        info!(session_id = %session_id, url = %url, "connecting to event stream");

        let cancel = CancellationToken::new();
        let driver = ConnectionDriver {
            generation,
            session_id,
            url,
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            transport: Arc::clone(&self.transport),
            dispatcher: Arc::clone(&self.dispatcher),
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
        };
        let task = runtime.spawn(driver.run());

        if let Some(stale) = self.active.lock().replace(ActiveConnection { cancel, task }) {
            stale.stop();
        }
        Ok(())
    }

    /// Stop streaming and forget the session. Safe to call repeatedly.
    ///
    /// Cancels any pending reconnect timer. Once this returns, no handler or
    /// hook fires for the closed connection.
    pub fn close(&self) {
        let previous = self.active.lock().take();
        self.shared.advance();
        if let Some(previous) = previous {
            previous.stop();
        }

        let session_id = self.shared.session_id.write().take();
        self.shared.transport_open.store(false, Ordering::SeqCst);
        let prior = std::mem::replace(&mut *self.shared.state.write(), ConnectionState::Disconnected);

        if prior != ConnectionState::Disconnected {
            info!(session_id = ?session_id, "event stream closed");
            self.hooks.closed();
        }
    }

    /// True only while a transport stream is open.
    pub fn is_connected(&self) -> bool {
        self.shared.transport_open.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Session currently connected or being retried.
    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().clone()
    }

    /// Last sequence number dispatched for the tracked session.
    pub fn last_seen_sequence(&self) -> Option<u64> {
        self.shared.gap.lock().last_seen_sequence()
    }

    pub fn config(&self) -> &StreamClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Subscribe a closure; see [`EventDispatcher::on_fn`].
    pub fn on<F>(&self, key: impl Into<EventKey>, callback: F) -> SubscriptionId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on_fn(key, callback)
    }

    /// Unsubscribe; see [`EventDispatcher::off`].
    pub fn off(&self, key: impl Into<EventKey>, id: SubscriptionId) -> bool {
        self.dispatcher.off(key, id)
    }

    /// Subscribe a channel; see [`EventDispatcher::subscribe_channel`].
    pub fn subscribe_channel(
        &self,
        key: impl Into<EventKey>,
    ) -> (SubscriptionId, tokio::sync::mpsc::UnboundedReceiver<StreamEvent>) {
        self.dispatcher.subscribe_channel(key)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            self.shared.advance();
            active.stop();
        }
    }
}

enum PumpExit {
    Cancelled,
    Completed,
    Failed(CoreError),
}

enum Delivery {
    /// Keep-alive or undecodable frame.
    Ignored,
    /// A decoded event (dispatched or deliberately dropped).
    Decoded,
    Terminal,
}

/// Task body for one `connect` call: open, pump, back off, repeat.
struct ConnectionDriver {
    generation: u64,
    session_id: String,
    url: Url,
    config: StreamClientConfig,
    hooks: LifecycleHooks,
    transport: Arc<dyn EventTransport>,
    dispatcher: Arc<EventDispatcher>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl ConnectionDriver {
    async fn run(self) {
        let mut attempt: u32 = 0;
        let mut last_event_id: Option<String> = None;

        loop {
            let started = self.shared.with_current(self.generation, || {
                self.shared.set_state(ConnectionState::Connecting);
                self.shared.gap.lock().begin_connection(&self.session_id);
            });
            if started.is_none() {
                return;
            }

            let request = StreamRequest {
                url: self.url.clone(),
                last_event_id: last_event_id.clone(),
            };
            let opened = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.transport.open(&request) => result,
            };

            let failure = match opened {
                Ok(stream) => {
                    match self.pump(stream, &mut attempt, &mut last_event_id).await {
                        PumpExit::Cancelled => return,
                        PumpExit::Completed => {
                            self.finish();
                            return;
                        }
                        PumpExit::Failed(err) => err,
                    }
                }
                Err(err) => err,
            };

            attempt = attempt.saturating_add(1);
            let delay = if self.config.auto_reconnect && failure.is_retryable() {
                self.config.reconnect.delay_for_attempt(attempt)
            } else {
                None
            };

            let reported = self.shared.with_current(self.generation, || {
                self.shared.transport_open.store(false, Ordering::SeqCst);
                match delay {
                    Some(delay) => {
                        self.shared.set_state(ConnectionState::Retrying);
                        warn!(
                            session_id = %self.session_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %failure,
                            "event stream failed; reconnecting"
                        );
                    }
                    None => {
                        self.shared.set_state(ConnectionState::Failed);
                        error!(
                            session_id = %self.session_id,
                            attempt,
                            retryable = failure.is_retryable(),
                            error = %failure,
                            "event stream failed; giving up"
                        );
                    }
                }
                self.hooks.errored(&failure);
            });
            let (Some(()), Some(delay)) = (reported, delay) else {
                return;
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            // A timer that outlived its session must not reconnect.
            let still_wanted = self
                .shared
                .with_current(self.generation, || self.shared.session_id.read().is_some());
            if still_wanted != Some(true) {
                return;
            }
        }
    }

    async fn pump(
        &self,
        opened: OpenedStream,
        attempt: &mut u32,
        last_event_id: &mut Option<String>,
    ) -> PumpExit {
        let OpenedStream {
            schema_version,
            mut events,
        } = opened;

        let info = ConnectionInfo {
            session_id: self.session_id.clone(),
            url: self.url.to_string(),
            server_version: check_server_version(schema_version.as_deref()),
            attempt: *attempt,
        };
        let announced = self.shared.with_current(self.generation, || {
            self.shared.transport_open.store(true, Ordering::SeqCst);
            self.shared.set_state(ConnectionState::Connected);
            info!(session_id = %self.session_id, attempt = *attempt, "event stream connected");
            self.hooks.opened(&info);
        });
        if announced.is_none() {
            return PumpExit::Cancelled;
        }

        let mut last_version: Option<Value> = None;
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                next = self.next_frame(&mut events) => next,
            };
            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => return PumpExit::Failed(CoreError::StreamClosed),
                Err(err) => return PumpExit::Failed(err),
            };

            if !frame.id.is_empty() {
                *last_event_id = Some(frame.id.clone());
            }
            match self.deliver(&frame, &mut last_version) {
                Some(Delivery::Ignored) => {}
                // Only a stream that carries events counts as recovered; an
                // accept-then-drop backend keeps burning attempts.
                Some(Delivery::Decoded) => *attempt = 0,
                Some(Delivery::Terminal) => return PumpExit::Completed,
                None => return PumpExit::Cancelled,
            }
        }
    }

    async fn next_frame(&self, events: &mut SseStream) -> Result<Option<SseEvent>, CoreError> {
        let next = match self.config.idle_timeout() {
            Some(limit) => tokio::time::timeout(limit, events.next())
                .await
                .map_err(|_| {
                    CoreError::timeout(format!("no event received for {} ms", limit.as_millis()))
                })?,
            None => events.next().await,
        };
        next.transpose()
    }

    /// Decode, sequence-check and dispatch one frame.
    ///
    /// Returns `None` if this driver has been superseded.
    fn deliver(&self, frame: &SseEvent, last_version: &mut Option<Value>) -> Option<Delivery> {
        let event = match decode_frame(frame) {
            Ok(Some(event)) => event,
            Ok(None) => return Some(Delivery::Ignored),
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "skipping undecodable frame");
                return Some(Delivery::Ignored);
            }
        };

        let live = || self.shared.is_current(self.generation);
        self.shared.with_current(self.generation, || {
            let check = self.shared.gap.lock().observe(&event);
            match check {
                Err(violation) => {
                    warn!(
                        session_id = %self.session_id,
                        event_type = %event.event_type,
                        error = %violation,
                        "dropping out-of-order event"
                    );
                    self.hooks.errored(&violation);
                    return Delivery::Decoded;
                }
                Ok(SequenceCheck::Duplicate) => {
                    debug!(
                        session_id = %self.session_id,
                        sequence = ?event.sequence,
                        "skipping replayed event"
                    );
                    return Delivery::Decoded;
                }
                Ok(SequenceCheck::Gap(report)) => {
                    warn!(
                        session_id = %self.session_id,
                        expected = report.expected_sequence,
                        actual = report.actual_sequence,
                        missed = report.missed_count,
                        "sequence gap after reconnect"
                    );
                    self.dispatcher.dispatch_while(&report.to_event(), live);
                    // A gap handler may have closed the client.
                    if !live() {
                        return Delivery::Decoded;
                    }
                }
                Ok(SequenceCheck::Fresh) | Ok(SequenceCheck::Untracked) => {}
            }

            if let Some(version) = event.data.get(SCHEMA_VERSION_FIELD) {
                if last_version.as_ref() != Some(version) {
                    *last_version = Some(version.clone());
                    self.hooks.version_checked(&check_event_version(&event));
                    if !live() {
                        return Delivery::Decoded;
                    }
                }
            }

            self.dispatcher.dispatch_while(&event, live);
            self.shared.gap.lock().record_delivered(event.sequence);

            if self.config.close_on_complete && event.is_terminal() {
                Delivery::Terminal
            } else {
                Delivery::Decoded
            }
        })
    }

    /// The deliberation finished: end the stream without reconnecting.
    fn finish(&self) {
        self.shared.with_current(self.generation, || {
            self.shared.transport_open.store(false, Ordering::SeqCst);
            self.shared.session_id.write().take();
            self.shared.set_state(ConnectionState::Disconnected);
            info!(session_id = %self.session_id, "deliberation complete; event stream closed");
            self.hooks.closed();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Retrying.to_string(), "retrying");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn test_generation_gate() {
        let shared = Shared::new();
        let first = shared.advance();
        assert_eq!(shared.with_current(first, || 7), Some(7));

        let second = shared.advance();
        assert_eq!(shared.with_current(first, || 7), None);
        assert!(shared.is_current(second));

        // Re-entrant: advancing from inside a gated section does not deadlock.
        let inner = shared.with_current(second, || shared.advance());
        assert_eq!(inner, Some(second + 1));
        assert!(!shared.is_current(second));
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let client = StreamClient::new(StreamClientConfig::default(), LifecycleHooks::default())
            .unwrap();
        let err = client.connect("sess-1").unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_rejects_empty_session() {
        let client = StreamClient::new(StreamClientConfig::default(), LifecycleHooks::default())
            .unwrap();
        assert!(matches!(
            client.connect(""),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent_without_connection() {
        let client = StreamClient::new(StreamClientConfig::default(), LifecycleHooks::default())
            .unwrap();
        client.close();
        client.close();
        assert!(client.session_id().is_none());
        assert!(!client.is_connected());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
