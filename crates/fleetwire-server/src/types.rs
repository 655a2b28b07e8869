//! Wire-level and filter value types for the streaming server (§6, §4.2).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetwire_types::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    EventType,
    Agent,
    Severity,
    Workflow,
}

/// One filter clause: OR across `values`, AND across distinct filters on
/// the same client (§3 "Client Subscription").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFilter {
    pub filter_type: FilterType,
    pub values: HashSet<String>,
}

impl ClientFilter {
    fn matches(&self, event: &Event) -> bool {
        match self.filter_type {
            FilterType::EventType => self.values.contains(event.event_type.as_str()),
            FilterType::Agent => event
                .agent_name()
                .map(|agent| self.values.contains(agent))
                .unwrap_or(false),
            FilterType::Severity => self.values.contains(event.severity()),
            FilterType::Workflow => event
                .workflow_id()
                .map(|workflow_id| self.values.contains(workflow_id))
                .unwrap_or(false),
        }
    }
}

/// An event matches a client iff it matches every filter (empty list
/// accepts everything).
pub fn event_matches(filters: &[ClientFilter], event: &Event) -> bool {
    filters.iter().all(|filter| filter.matches(event))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Subscribed,
    Disconnecting,
    Closed,
}

/// Snapshot of one client's subscription, for introspection/health.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSubscriptionView {
    pub client_id: String,
    pub state: ConnectionState,
    pub filter_count: usize,
    pub connected_at: DateTime<Utc>,
    pub events_sent: u64,
}

/// Client -> server control messages (§6 wire protocol).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { filters: Vec<ClientFilter> },
    Unsubscribe,
    Ping,
}

/// Server -> client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Event { v: u8, event: &'a Event },
    Pong { t: i64 },
    Error { kind: &'static str },
}
