//! Board of One core library.
//!
//! Client side of the deliberation event stream:
//! - SSE transport and session stream URLs
//! - Connection management with reconnect, backoff and resume
//! - Typed event dispatch
//! - Schema-version negotiation and sequence gap detection
//! - Configuration and error types
//!
//! The event catalog and payload types live in `bo1_core_types` and are
//! re-exported here.

pub mod config;
pub mod errors;
pub mod sse;
pub mod streaming;
pub mod urls;

pub use errors::{CoreError, CoreResult, HttpErrorInfo, SequenceViolationInfo};

pub use sse::{EventTransport, HttpTransport, OpenedStream, SseEvent, SseStream, StreamRequest};

pub use streaming::{
    BackoffStrategy, BufferedHandler, CallbackHandler, ChannelHandler, ConnectionInfo,
    ConnectionState, DispatchReport, EventDispatcher, EventHandler, EventKey, GapDetector,
    GapReport, LifecycleHooks, ReconnectPolicy, SequenceCheck, StreamClient, StreamClientConfig,
    StreamEvent, SubscriptionId, VersionCheck, WILDCARD,
};

pub use bo1_core_types::{EventPayload, EventType, SCHEMA_VERSION};
