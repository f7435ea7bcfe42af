//! Connection lifecycle callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::handler::isolate;
use super::version::VersionCheck;
use crate::errors::CoreError;

/// Details passed to `on_open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub session_id: String,
    pub url: String,
    /// Result of checking the server's schema-version header.
    pub server_version: VersionCheck,
    /// Reconnect attempts that preceded this open (0 on first connect).
    pub attempt: u32,
}

pub type OpenHook = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&CoreError) + Send + Sync>;
pub type CloseHook = Arc<dyn Fn() + Send + Sync>;
pub type VersionHook = Arc<dyn Fn(&VersionCheck) + Send + Sync>;

/// Optional lifecycle notifications supplied at client construction.
///
/// Best effort: a panicking hook is logged and otherwise ignored.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_open: Option<OpenHook>,
    on_error: Option<ErrorHook>,
    on_close: Option<CloseHook>,
    on_version: Option<VersionHook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time a transport stream opens.
    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(hook));
        self
    }

    /// Called on transport failures and sequence violations.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CoreError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Called when the client returns to `disconnected`.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Called when an event's `schema_version` differs from the previous one
    /// seen on the same connection. The header check goes to `on_open`.
    pub fn on_version<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VersionCheck) + Send + Sync + 'static,
    {
        self.on_version = Some(Arc::new(hook));
        self
    }

    pub(crate) fn opened(&self, info: &ConnectionInfo) {
        if let Some(ref hook) = self.on_open {
            isolate("on_open", || hook(info));
        }
    }

    pub(crate) fn errored(&self, error: &CoreError) {
        if let Some(ref hook) = self.on_error {
            isolate("on_error", || hook(error));
        }
    }

    pub(crate) fn version_checked(&self, check: &VersionCheck) {
        if let Some(ref hook) = self.on_version {
            isolate("on_version", || hook(check));
        }
    }

    pub(crate) fn closed(&self) {
        if let Some(ref hook) = self.on_close {
            isolate("on_close", || hook());
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_version", &self.on_version.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hooks_fire_and_panics_are_contained() {
        let closes = Arc::new(AtomicUsize::new(0));
        let closes_clone = Arc::clone(&closes);

        let hooks = LifecycleHooks::new()
            .on_error(|_| panic!("hook failure"))
            .on_close(move || {
                closes_clone.fetch_add(1, Ordering::SeqCst);
            });

        hooks.errored(&CoreError::StreamClosed);
        hooks.closed();
        hooks.closed();

        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_hooks_are_no_ops() {
        let hooks = LifecycleHooks::default();
        hooks.closed();
        hooks.errored(&CoreError::StreamClosed);
        assert_eq!(
            format!("{:?}", hooks),
            "LifecycleHooks { on_open: false, on_error: false, on_close: false, on_version: false }"
        );
    }
}
