//! Event handler trait and built-in handlers.
//!
//! Handlers receive decoded events from the dispatcher. They run
//! synchronously on the connection task and must not block.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::error;

use super::types::StreamEvent;

/// Trait for handling stream events.
pub trait EventHandler: Send + Sync {
    /// Process a stream event.
    fn handle(&self, event: &StreamEvent);
}

/// A handler that calls a callback function.
pub struct CallbackHandler<F>
where
    F: Fn(&StreamEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(&StreamEvent) + Send + Sync,
{
    /// Create a new callback handler.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(&StreamEvent) + Send + Sync,
{
    fn handle(&self, event: &StreamEvent) {
        (self.callback)(event);
    }
}

/// A handler that buffers events in memory.
pub struct BufferedHandler {
    events: Mutex<VecDeque<StreamEvent>>,
    max_size: Option<usize>,
}

impl BufferedHandler {
    /// Create a new buffered handler.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_size: None,
        }
    }

    /// Create a handler with a maximum buffer size.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_size.min(1000))),
            max_size: Some(max_size),
        }
    }

    /// Get all buffered events.
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Remove and return all buffered events.
    pub fn drain(&self) -> Vec<StreamEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Clear the buffer.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Get the number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BufferedHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for BufferedHandler {
    fn handle(&self, event: &StreamEvent) {
        let mut events = self.events.lock();

        // Drop oldest if at max size
        if let Some(max) = self.max_size {
            if max == 0 {
                return;
            }
            while events.len() >= max {
                events.pop_front();
            }
        }

        events.push_back(event.clone());
    }
}

/// A handler that forwards events into an unbounded channel.
///
/// This is how async consumers await events: subscribe a channel and
/// `recv().await` on the receiving half.
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelHandler {
    /// Create a handler and the receiver it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventHandler for ChannelHandler {
    fn handle(&self, event: &StreamEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}

/// Run `f`, catching a panic so one misbehaving callback cannot take down
/// the connection task. Returns `false` if `f` panicked.
pub(crate) fn isolate<F: FnOnce()>(what: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(panic) => {
            error!(callback = what, panic = %panic_message(panic.as_ref()), "callback panicked");
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo1_core_types::EventType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn event(seq: u64) -> StreamEvent {
        StreamEvent::new(EventType::Contribution, serde_json::json!({})).with_sequence(seq)
    }

    #[test]
    fn test_callback_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let handler = CallbackHandler::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        handler.handle(&event(1));
        handler.handle(&event(2));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_buffered_handler() {
        let handler = BufferedHandler::new();

        handler.handle(&event(1));
        handler.handle(&event(2));

        assert_eq!(handler.len(), 2);
        assert_eq!(handler.events().len(), 2);

        let drained = handler.drain();
        assert_eq!(drained.len(), 2);
        assert!(handler.is_empty());
    }

    #[test]
    fn test_buffered_handler_max_size() {
        let handler = BufferedHandler::with_max_size(2);

        for i in 0..5 {
            handler.handle(&event(i));
        }

        // Should only have the last 2 events
        assert_eq!(handler.len(), 2);
        let events = handler.events();
        assert_eq!(events[0].sequence, Some(3));
        assert_eq!(events[1].sequence, Some(4));
    }

    #[test]
    fn test_channel_handler() {
        let (handler, mut rx) = ChannelHandler::channel();
        handler.handle(&event(9));
        assert_eq!(rx.try_recv().unwrap().sequence, Some(9));

        drop(rx);
        // Sending after the receiver is gone is not an error.
        handler.handle(&event(10));
    }

    #[test]
    fn test_isolate_catches_panics() {
        assert!(isolate("ok", || {}));
        assert!(!isolate("boom", || panic!("handler exploded")));
    }
}
