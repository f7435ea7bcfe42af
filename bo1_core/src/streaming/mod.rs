//! Session event streaming.
//!
//! - [`client`]: connection manager with reconnect and backoff
//! - [`dispatcher`]: typed subscriptions and ordered delivery
//! - [`gap`]: sequence tracking across reconnects
//! - [`version`]: schema-version negotiation
//! - [`handler`] / [`hooks`]: consumer callbacks

pub mod backoff;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod gap;
pub mod handler;
pub mod hooks;
pub mod types;
pub mod version;

pub use backoff::{BackoffStrategy, ReconnectPolicy};
pub use client::{ConnectionState, StreamClient};
pub use config::StreamClientConfig;
pub use dispatcher::{
    decode_frame, DispatchReport, EventDispatcher, EventKey, SubscriptionId, WILDCARD,
};
pub use gap::{GapDetector, GapReport, SequenceCheck};
pub use handler::{BufferedHandler, CallbackHandler, ChannelHandler, EventHandler};
pub use hooks::{ConnectionInfo, LifecycleHooks};
pub use types::StreamEvent;
pub use version::{
    check_event_version, check_payload_version, check_server_version, VersionCheck,
    SCHEMA_VERSION_HEADER,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _ = ConnectionState::Disconnected;
        let _ = StreamClientConfig::default();
        let _ = ReconnectPolicy::default();
        let _ = EventDispatcher::new();
        let _ = GapDetector::new();
        let _ = BufferedHandler::new();
        let _ = LifecycleHooks::default();
    }
}
