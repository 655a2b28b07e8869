//! In-process pub/sub fabric (C2). Every other component stands on this.
//!
//! Handlers are registered under an explicit `(event_type, handler_id)` key
//! rather than identity-compared closures — Rust has no stable way to
//! compare trait objects for equality, so the caller supplies the id and
//! `subscribe` is idempotent on it, per the design note on reflection-like
//! registries.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use fleetwire_types::{Event, EventType};

/// Uniform handler contract: synchronous completion or a completion signal,
/// the bus adapts either way by always invoking handlers from a dedicated
/// per-handler worker task so a slow handler never blocks the publisher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), String>;
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EventBusStats {
    pub events_published: u64,
    pub handler_errors: u64,
    pub subscribers_by_type: HashMap<EventType, usize>,
}

struct DispatchItem {
    event: Event,
    done: Option<oneshot::Sender<()>>,
}

struct HandlerSlot {
    sender: mpsc::UnboundedSender<DispatchItem>,
}

#[derive(Default)]
struct Counters {
    events_published: AtomicU64,
    handler_errors: AtomicU64,
}

struct Inner {
    // event_type -> handler_id -> slot
    registry: RwLock<HashMap<EventType, HashMap<String, HandlerSlot>>>,
    counters: Counters,
}

/// The Event Bus. Cheap to clone; every clone shares the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Registers `handler` under `handler_id` for `event_type`. Re-subscribing
    /// the same `(event_type, handler_id)` pair is a no-op (idempotent).
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler_id: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) {
        let handler_id = handler_id.into();
        let mut registry = self.inner.registry.write();
        let handlers = registry.entry(event_type).or_default();
        if handlers.contains_key(&handler_id) {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchItem>();
        let counters_errors = self.inner.clone();
        let worker_handler_id = handler_id.clone();
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let outcome = AssertUnwindSafe(handler.handle(item.event))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(message)) => {
                        counters_errors
                            .counters
                            .handler_errors
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(handler_id = %worker_handler_id, error = %message, "event handler failed");
                    }
                    Err(panic) => {
                        counters_errors
                            .counters
                            .handler_errors
                            .fetch_add(1, Ordering::Relaxed);
                        let message = panic_message(&panic);
                        warn!(handler_id = %worker_handler_id, panic = %message, "event handler panicked");
                    }
                }
                if let Some(done) = item.done {
                    let _ = done.send(());
                }
            }
        });

        handlers.insert(handler_id, HandlerSlot { sender: tx });
    }

    /// Removes a subscription. Returns whether one was present.
    pub fn unsubscribe(&self, event_type: EventType, handler_id: &str) -> bool {
        let mut registry = self.inner.registry.write();
        registry
            .get_mut(&event_type)
            .map(|handlers| handlers.remove(handler_id).is_some())
            .unwrap_or(false)
    }

    /// Non-blocking: enqueues dispatch to every currently-registered handler
    /// for `event.event_type` and returns immediately.
    pub fn publish(&self, event: Event) {
        self.inner
            .counters
            .events_published
            .fetch_add(1, Ordering::Relaxed);
        let registry = self.inner.registry.read();
        if let Some(handlers) = registry.get(&event.event_type) {
            for slot in handlers.values() {
                let _ = slot.sender.send(DispatchItem {
                    event: event.clone(),
                    done: None,
                });
            }
        }
    }

    /// Returns only after every handler registered for `event.event_type` at
    /// call time has finished processing this event.
    pub async fn publish_and_wait(&self, event: Event) {
        self.inner
            .counters
            .events_published
            .fetch_add(1, Ordering::Relaxed);
        let mut waiters = Vec::new();
        {
            let registry = self.inner.registry.read();
            if let Some(handlers) = registry.get(&event.event_type) {
                for slot in handlers.values() {
                    let (done_tx, done_rx) = oneshot::channel();
                    if slot
                        .sender
                        .send(DispatchItem {
                            event: event.clone(),
                            done: Some(done_tx),
                        })
                        .is_ok()
                    {
                        waiters.push(done_rx);
                    }
                }
            }
        }
        for waiter in waiters {
            let _ = waiter.await;
        }
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.inner
            .registry
            .read()
            .get(&event_type)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> EventBusStats {
        let registry = self.inner.registry.read();
        let subscribers_by_type = registry
            .iter()
            .map(|(event_type, handlers)| (*event_type, handlers.len()))
            .collect();
        EventBusStats {
            events_published: self.inner.counters.events_published.load(Ordering::Relaxed),
            handler_errors: self.inner.counters.handler_errors.load(Ordering::Relaxed),
            subscribers_by_type,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwire_types::EventType;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex;

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: Event) -> Result<(), String> {
            self.seen.lock().await.push(event.trace_id.clone());
            if self.fail {
                return Err("boom".to_string());
            }
            Ok(())
        }
    }

    fn test_event(trace_id: &str) -> Event {
        Event::new(EventType::AgentInvoked, "session-1", trace_id, json!({})).unwrap()
    }

    #[tokio::test]
    async fn delivers_to_every_registered_handler_exactly_once() {
        let bus = EventBus::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventType::AgentInvoked,
            "a",
            Arc::new(RecordingHandler {
                seen: seen_a.clone(),
                fail: false,
            }),
        );
        bus.subscribe(
            EventType::AgentInvoked,
            "b",
            Arc::new(RecordingHandler {
                seen: seen_b.clone(),
                fail: false,
            }),
        );

        bus.publish_and_wait(test_event("t1")).await;

        assert_eq!(*seen_a.lock().await, vec!["t1".to_string()]);
        assert_eq!(*seen_b.lock().await, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn handler_failure_is_isolated_and_counted() {
        let bus = EventBus::new();
        let seen_ok = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventType::AgentInvoked,
            "failing",
            Arc::new(RecordingHandler {
                seen: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }),
        );
        bus.subscribe(
            EventType::AgentInvoked,
            "ok",
            Arc::new(RecordingHandler {
                seen: seen_ok.clone(),
                fail: false,
            }),
        );

        bus.publish_and_wait(test_event("t1")).await;

        assert_eq!(seen_ok.lock().await.len(), 1);
        assert_eq!(bus.stats().handler_errors, 1);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_per_handler_id() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        struct CountingHandler(Arc<AtomicUsize>);
        #[async_trait]
        impl EventHandler for CountingHandler {
            async fn handle(&self, _event: Event) -> Result<(), String> {
                self.0.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
        bus.subscribe(
            EventType::AgentInvoked,
            "dup",
            Arc::new(CountingHandler(counter.clone())),
        );
        bus.subscribe(
            EventType::AgentInvoked,
            "dup",
            Arc::new(CountingHandler(counter.clone())),
        );

        assert_eq!(bus.subscriber_count(EventType::AgentInvoked), 1);
        bus.publish_and_wait(test_event("t1")).await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventType::AgentInvoked,
            "h",
            Arc::new(RecordingHandler {
                seen: seen.clone(),
                fail: false,
            }),
        );
        assert!(bus.unsubscribe(EventType::AgentInvoked, "h"));
        assert!(!bus.unsubscribe(EventType::AgentInvoked, "h"));
        bus.publish_and_wait(test_event("t1")).await;
        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn per_handler_delivery_preserves_publish_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventType::AgentInvoked,
            "ordered",
            Arc::new(RecordingHandler {
                seen: seen.clone(),
                fail: false,
            }),
        );
        bus.publish_and_wait(test_event("t1")).await;
        bus.publish_and_wait(test_event("t2")).await;
        bus.publish_and_wait(test_event("t3")).await;
        assert_eq!(
            *seen.lock().await,
            vec!["t1".to_string(), "t2".to_string(), "t3".to_string()]
        );
    }
}
