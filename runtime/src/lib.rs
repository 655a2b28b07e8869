//! Process-wide `initialize`/`shutdown` surface: wires the Event Bus, the
//! Metrics Aggregator, the Model Router, the Agent Coordinator, the Fleet
//! Tracker, and the Streaming Server together, plus the two C9 consumer
//! stubs (persistent log, query store). `fleetwire-runtimed` (`main.rs`) is
//! a thin CLI shell over this module.

pub mod consumers;
pub mod singleton;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use fleetwire_coordinator::{AgentRegistry, Coordinator};
use fleetwire_core::config::ConfigStore;
use fleetwire_core::event_bus::EventHandler;
use fleetwire_core::{EventBus, MetricsAggregator};
use fleetwire_fleet::FleetTracker;
use fleetwire_router::{ModelRouter, RouterSubscriber};
use fleetwire_server::StreamingServer;
use fleetwire_types::{Event, EventType, RuntimeConfig};

use consumers::{PersistentLogSubscriber, QueryStoreSubscriber};

/// Every long-lived collaborator the runtime wires up at startup. Holding
/// this alive keeps the bus, router, coordinator, and streaming server
/// running; dropping it (after `shutdown`) tears the process down cleanly.
pub struct Components {
    pub config: ConfigStore,
    pub bus: EventBus,
    pub metrics: Arc<MetricsAggregator>,
    pub router: Arc<ModelRouter>,
    pub router_subscriber: RouterSubscriber,
    pub coordinator: Arc<Coordinator>,
    pub fleet: FleetTracker,
    pub streaming: StreamingServer,
    pub query_store: Arc<QueryStoreSubscriber>,
    pub log_path: Option<PathBuf>,
}

/// Loads `config_path`, builds every collaborator, and wires the Event Bus
/// subscriptions between them. `log_dir` controls where the persistent
/// event log is appended; pass `None` to skip it (e.g. in tests).
///
/// `registry` is the caller's populated `AgentRegistry` (every `agent_name`
/// the host's workflows dispatch to must be registered on it first) — the
/// Coordinator has no way to register agents after construction, so it has
/// to arrive here already built.
pub async fn initialize(
    config_path: impl AsRef<Path>,
    log_dir: Option<&Path>,
    registry: AgentRegistry,
) -> anyhow::Result<Components> {
    let config = ConfigStore::load(config_path).await?;
    let runtime_config: RuntimeConfig = config.get();

    let bus = EventBus::new();

    let metrics = Arc::new(MetricsAggregator::new(runtime_config.metrics.max_records));
    bus_subscribe_all(&bus, "fleetwire-runtime::metrics", MetricsSubscriber(metrics.clone()));

    let router = Arc::new(ModelRouter::new(
        runtime_config.tiers.clone(),
        runtime_config.routing.clone(),
    ));
    let router_subscriber = RouterSubscriber::install(router.clone(), bus.clone());

    let coordinator = Arc::new(Coordinator::new(
        bus.clone(),
        registry,
        runtime_config.coordinator.clone(),
    ));

    let fleet = FleetTracker::new().install(&bus);

    let streaming = StreamingServer::new(&bus, runtime_config.streaming.clone());
    streaming.set_health_extra({
        let router = router.clone();
        let coordinator = coordinator.clone();
        move || {
            serde_json::json!({
                "router": router.stats(),
                "coordinator": coordinator.stats(),
            })
        }
    });

    let query_store = QueryStoreSubscriber::new();
    for event_type in EventType::ALL {
        bus.subscribe(
            *event_type,
            "fleetwire-runtime::query_store",
            query_store.clone() as Arc<dyn EventHandler>,
        );
    }

    let log_path = match log_dir {
        Some(dir) => {
            let subscriber = Arc::new(PersistentLogSubscriber::open(dir, &session_label())?);
            let path = subscriber.path().to_path_buf();
            for event_type in EventType::ALL {
                bus.subscribe(*event_type, "fleetwire-runtime::log", subscriber.clone());
            }
            Some(path)
        }
        None => None,
    };

    Ok(Components {
        config,
        bus,
        metrics,
        router,
        router_subscriber,
        coordinator,
        fleet,
        streaming,
        query_store,
        log_path,
    })
}

/// Nothing here owns a background task that needs cancelling (the bus's
/// per-handler workers exit when the bus is dropped); this exists as the
/// named counterpart to `initialize` for callers that want an explicit
/// teardown point, e.g. before process exit.
pub fn shutdown(components: Components) {
    tracing::info!(
        connected_clients = components.streaming.connected_clients(),
        events_logged = components.query_store.len(),
        "fleetwire runtime shutting down"
    );
    drop(components);
}

fn session_label() -> String {
    format!("{}", std::process::id())
}

fn bus_subscribe_all(bus: &EventBus, handler_id: &str, handler: impl EventHandler + 'static) {
    let handler = Arc::new(handler);
    for event_type in EventType::ALL {
        bus.subscribe(*event_type, handler_id, handler.clone());
    }
}

struct MetricsSubscriber(Arc<MetricsAggregator>);

#[async_trait]
impl EventHandler for MetricsSubscriber {
    async fn handle(&self, event: Event) -> Result<(), String> {
        self.0.record(&event);
        Ok(())
    }
}

