//! Streaming Server (C4) core: fans Event Bus traffic out to registered
//! remote subscribers, evaluating per-client filters and enforcing
//! per-client backpressure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use fleetwire_core::event_bus::{EventBusStats, EventHandler};
use fleetwire_core::EventBus;
use fleetwire_types::{Event, EventType, StreamingConfig};

use crate::types::{event_matches, ClientFilter, ClientSubscriptionView, ConnectionState};

/// A caller-supplied snapshot of counters `fleetwire-server` has no crate
/// dependency on (the Model Router's and Agent Coordinator's), folded into
/// the `/healthz` response alongside the Event Bus and streaming counters.
pub type HealthExtra = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

struct ClientEntry {
    sender: mpsc::Sender<Event>,
    filters: Mutex<Vec<ClientFilter>>,
    state: Mutex<ConnectionState>,
    connected_at: chrono::DateTime<Utc>,
    events_sent: AtomicU64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StreamingStats {
    pub events_streamed: u64,
    pub bytes_sent: u64,
    pub connection_count: u64,
    pub clients_dropped: u64,
}

#[derive(Default)]
struct Counters {
    events_streamed: AtomicU64,
    bytes_sent: AtomicU64,
    connection_count: AtomicU64,
    clients_dropped: AtomicU64,
}

struct Inner {
    clients: Mutex<HashMap<String, Arc<ClientEntry>>>,
    counters: Counters,
    config: StreamingConfig,
    bus: EventBus,
    health_extra: Mutex<Option<HealthExtra>>,
}

/// Hands out per-client receivers and matches bus events against every
/// connected client's filters. Cheap to clone; every clone shares state.
#[derive(Clone)]
pub struct StreamingServer {
    inner: Arc<Inner>,
}

impl StreamingServer {
    pub fn new(bus: &EventBus, config: StreamingConfig) -> Self {
        let server = Self {
            inner: Arc::new(Inner {
                clients: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                config,
                bus: bus.clone(),
                health_extra: Mutex::new(None),
            }),
        };
        // The streaming server must see every event type to evaluate
        // per-client filters, so it subscribes to the whole catalogue.
        for event_type in EventType::ALL {
            bus.subscribe(
                *event_type,
                "fleetwire-server::fanout",
                Arc::new(server.clone()) as Arc<dyn EventHandler>,
            );
        }
        server
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> StreamingStats {
        StreamingStats {
            events_streamed: self.inner.counters.events_streamed.load(Ordering::Relaxed),
            bytes_sent: self.inner.counters.bytes_sent.load(Ordering::Relaxed),
            connection_count: self.inner.counters.connection_count.load(Ordering::Relaxed),
            clients_dropped: self.inner.counters.clients_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.inner.clients.lock().len()
    }

    pub fn bus_stats(&self) -> EventBusStats {
        self.inner.bus.stats()
    }

    /// Registers a callback the `/healthz` handler folds into its response,
    /// for counters (Model Router, Agent Coordinator) this crate has no
    /// dependency on. Overwrites any previously registered callback.
    pub fn set_health_extra<F>(&self, f: F)
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        *self.inner.health_extra.lock() = Some(Arc::new(f));
    }

    pub fn health_extra(&self) -> Option<serde_json::Value> {
        self.inner.health_extra.lock().as_ref().map(|f| f())
    }

    /// Registers a new connection (state `CONNECTED`) and returns a
    /// receiver the connection's send pump should drain.
    pub fn register(&self, client_id: impl Into<String>) -> mpsc::Receiver<Event> {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::channel(self.inner.config.send_queue_max.max(1));
        let entry = Arc::new(ClientEntry {
            sender: tx,
            filters: Mutex::new(Vec::new()),
            state: Mutex::new(ConnectionState::Connected),
            connected_at: Utc::now(),
            events_sent: AtomicU64::new(0),
        });
        self.inner.clients.lock().insert(client_id, entry);
        self.inner
            .counters
            .connection_count
            .fetch_add(1, Ordering::Relaxed);
        rx
    }

    pub fn subscribe(&self, client_id: &str, filters: Vec<ClientFilter>) {
        let clients = self.inner.clients.lock();
        if let Some(entry) = clients.get(client_id) {
            *entry.filters.lock() = filters;
            *entry.state.lock() = ConnectionState::Subscribed;
        }
    }

    pub fn unsubscribe(&self, client_id: &str) {
        let clients = self.inner.clients.lock();
        if let Some(entry) = clients.get(client_id) {
            entry.filters.lock().clear();
        }
    }

    pub fn mark_disconnecting(&self, client_id: &str) {
        let clients = self.inner.clients.lock();
        if let Some(entry) = clients.get(client_id) {
            *entry.state.lock() = ConnectionState::Disconnecting;
        }
    }

    pub fn remove(&self, client_id: &str) {
        self.inner.clients.lock().remove(client_id);
    }

    pub fn client_view(&self, client_id: &str) -> Option<ClientSubscriptionView> {
        let clients = self.inner.clients.lock();
        let entry = clients.get(client_id)?;
        Some(ClientSubscriptionView {
            client_id: client_id.to_string(),
            state: *entry.state.lock(),
            filter_count: entry.filters.lock().len(),
            connected_at: entry.connected_at,
            events_sent: entry.events_sent.load(Ordering::Relaxed),
        })
    }
}

#[async_trait]
impl EventHandler for StreamingServer {
    async fn handle(&self, event: Event) -> Result<(), String> {
        let clients: Vec<(String, Arc<ClientEntry>)> = self
            .inner
            .clients
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        let approx_bytes = serde_json::to_vec(&event).map(|bytes| bytes.len()).unwrap_or(0) as u64;

        for (client_id, entry) in clients {
            if *entry.state.lock() == ConnectionState::Disconnecting {
                continue;
            }
            let filters = entry.filters.lock().clone();
            if !event_matches(&filters, &event) {
                continue;
            }
            match entry.sender.try_send(event.clone()) {
                Ok(()) => {
                    entry.events_sent.fetch_add(1, Ordering::Relaxed);
                    self.inner
                        .counters
                        .events_streamed
                        .fetch_add(1, Ordering::Relaxed);
                    self.inner
                        .counters
                        .bytes_sent
                        .fetch_add(approx_bytes, Ordering::Relaxed);
                }
                Err(_) => {
                    // Backpressure: the client's outbound queue is full.
                    // Drop it rather than block the bus's dispatch worker.
                    warn!(client_id, "streaming client exceeded send queue, disconnecting");
                    *entry.state.lock() = ConnectionState::Disconnecting;
                    self.inner
                        .counters
                        .clients_dropped
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}
