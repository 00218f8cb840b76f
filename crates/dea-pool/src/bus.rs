//! Message bus seam.
//!
//! The pool only needs to subscribe to subjects. `InMemoryBus` delivers
//! published payloads synchronously to every handler on the subject, which
//! is enough for the daemon's replay mode and for tests.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

/// Callback invoked with the raw payload of each message on a subject.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub trait MessageBus: Send + Sync {
    fn subscribe(&self, subject: &str, handler: MessageHandler);
}

#[derive(Default)]
pub struct InMemoryBus {
    handlers: RwLock<HashMap<String, Vec<MessageHandler>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every handler on `subject`.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, subject: &str, payload: &[u8]) -> usize {
        // Clone the handler list so a handler may itself subscribe.
        let handlers = {
            let registry = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            registry.get(subject).cloned().unwrap_or_default()
        };

        for handler in &handlers {
            handler(payload);
        }
        debug!(%subject, delivered = handlers.len(), "message published");
        handlers.len()
    }

    pub fn subscriber_count(&self, subject: &str) -> usize {
        let registry = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(subject).map_or(0, Vec::len)
    }
}

impl MessageBus for InMemoryBus {
    fn subscribe(&self, subject: &str, handler: MessageHandler) {
        let mut registry = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        registry.entry(subject.to_string()).or_default().push(handler);
        debug!(%subject, "subscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: &Arc<AtomicUsize>) -> MessageHandler {
        let counter = counter.clone();
        Arc::new(move |payload: &[u8]| {
            counter.fetch_add(payload.len(), Ordering::SeqCst);
        })
    }

    #[test]
    fn publish_reaches_only_matching_subject() {
        let bus = InMemoryBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe("dea.advertise", counting_handler(&hits));

        assert_eq!(bus.publish("dea.advertise", b"abc"), 1);
        assert_eq!(bus.publish("dea.shutdown", b"abcdef"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn publish_fans_out() {
        let bus = InMemoryBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe("s", counting_handler(&hits));
        bus.subscribe("s", counting_handler(&hits));

        assert_eq!(bus.subscriber_count("s"), 2);
        assert_eq!(bus.publish("s", b"x"), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.subscriber_count("nobody"), 0);
        assert_eq!(bus.publish("nobody", b"x"), 0);
    }
}
