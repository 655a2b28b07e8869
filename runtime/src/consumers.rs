//! The Event Bus's two pure-consumer subscribers (C9). Both are declared
//! out of scope by spec.md §1 — the persistent log backs onto external
//! storage/rotation and the query store backs onto external analytics —
//! so only their subscription contract (§6) is implemented here: every
//! event is delivered to them, in order, and they never publish back.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use fleetwire_core::event_bus::EventHandler;
use fleetwire_types::Event;

/// Appends one JSON object per line (§6: "one JSON object per line, UTF-8,
/// newline-terminated ... plus the event `v1` version tag"). Rotation and
/// compression are the external log subsystem's concern; this subscriber
/// only guarantees the append contract.
pub struct PersistentLogSubscriber {
    file: Mutex<File>,
    path: PathBuf,
}

impl PersistentLogSubscriber {
    pub fn open(dir: impl AsRef<Path>, session_label: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.as_ref().join(format!("session_{session_label}.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventHandler for PersistentLogSubscriber {
    async fn handle(&self, event: Event) -> Result<(), String> {
        let mut line = serde_json::to_value(&event).map_err(|err| err.to_string())?;
        if let Some(object) = line.as_object_mut() {
            object.insert("v".to_string(), json!(1));
        }
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|err| err.to_string())
    }
}

/// Relational-shaped in-memory index over the event stream, keyed by
/// `session_id`, `agent`, `event_type`, and `timestamp` (§6). Used only by
/// external analytics; the core never queries it.
#[derive(Default)]
pub struct QueryStoreSubscriber {
    inner: Mutex<QueryStoreInner>,
}

#[derive(Default)]
struct QueryStoreInner {
    events: Vec<Event>,
    by_session: HashMap<String, Vec<usize>>,
    by_agent: HashMap<String, Vec<usize>>,
    by_event_type: HashMap<String, Vec<usize>>,
}

impl QueryStoreSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn by_session_id(&self, session_id: &str) -> Vec<Event> {
        let inner = self.inner.lock();
        inner
            .by_session
            .get(session_id)
            .map(|indices| indices.iter().map(|&i| inner.events[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn by_agent(&self, agent: &str) -> Vec<Event> {
        let inner = self.inner.lock();
        inner
            .by_agent
            .get(agent)
            .map(|indices| indices.iter().map(|&i| inner.events[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn by_event_type(&self, event_type: &str) -> Vec<Event> {
        let inner = self.inner.lock();
        inner
            .by_event_type
            .get(event_type)
            .map(|indices| indices.iter().map(|&i| inner.events[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventHandler for QueryStoreSubscriber {
    async fn handle(&self, event: Event) -> Result<(), String> {
        let mut inner = self.inner.lock();
        let index = inner.events.len();
        inner
            .by_session
            .entry(event.session_id.clone())
            .or_default()
            .push(index);
        if let Some(agent) = event.agent_name() {
            inner.by_agent.entry(agent.to_string()).or_default().push(index);
        }
        inner
            .by_event_type
            .entry(event.event_type.as_str().to_string())
            .or_default()
            .push(index);
        inner.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwire_core::EventBus;
    use fleetwire_types::EventType;
    use serde_json::json as jsonmacro;

    #[tokio::test]
    async fn persistent_log_appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let subscriber = Arc::new(PersistentLogSubscriber::open(dir.path(), "test").unwrap());
        let bus = EventBus::new();
        bus.subscribe(EventType::SessionStarted, "log", subscriber.clone());
        bus.publish_and_wait(
            Event::new(EventType::SessionStarted, "s1", "t1", jsonmacro!({})).unwrap(),
        )
        .await;

        let contents = std::fs::read_to_string(subscriber.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["v"], 1);
        assert_eq!(parsed["session_id"], "s1");
    }

    #[tokio::test]
    async fn query_store_indexes_by_session_agent_and_event_type() {
        let store = QueryStoreSubscriber::new();
        let bus = EventBus::new();
        bus.subscribe(EventType::AgentInvoked, "query", store.clone());
        bus.publish_and_wait(
            Event::new(
                EventType::AgentInvoked,
                "s1",
                "t1",
                fleetwire_types::payload::agent_invoked("scout", None, None, &[], None, None),
            )
            .unwrap(),
        )
        .await;

        assert_eq!(store.by_session_id("s1").len(), 1);
        assert_eq!(store.by_agent("scout").len(), 1);
        assert_eq!(store.by_event_type("agent.invoked").len(), 1);
        assert_eq!(store.len(), 1);
    }
}
