//! Rolling-window metrics aggregator (C3): bounded-memory time-series
//! statistics derived from the event stream.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use fleetwire_types::{Event, EventType};

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub agent: Option<String>,
    pub duration_ms: Option<u64>,
    pub tokens: Option<u64>,
    pub cost: Option<f64>,
    pub success: bool,
}

impl EventRecord {
    fn from_event(event: &Event) -> Self {
        let agent = event.agent_name().map(|s| s.to_string());
        let duration_ms = event
            .payload
            .get("duration_ms")
            .and_then(|v| v.as_u64());
        let tokens = event.payload.get("tokens").and_then(|v| v.as_u64());
        let cost = event
            .payload
            .get("cost")
            .and_then(|v| v.as_f64())
            .or_else(|| event.payload.get("amount").and_then(|v| v.as_f64()));
        let success = !matches!(event.event_type, EventType::AgentFailed | EventType::ToolFailed);

        Self {
            timestamp: event.timestamp,
            event_type: event.event_type,
            agent,
            duration_ms,
            tokens,
            cost,
            success,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub window_seconds: u64,
    pub total_events: usize,
    pub events_by_type: HashMap<EventType, usize>,
    pub agents_active: usize,
    pub workflows_active: usize,
    pub mean_duration_ms: f64,
    pub p50_duration_ms: u64,
    pub p95_duration_ms: u64,
    pub p99_duration_ms: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub events_per_second: f64,
    pub agents_per_minute: f64,
    pub tokens_per_second: f64,
    pub cost_per_hour: f64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CumulativeStats {
    pub total_events: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub events_by_type: HashMap<EventType, u64>,
}

#[derive(Default)]
struct CumulativeCounters {
    total_events: AtomicU64,
    total_tokens: AtomicU64,
    // cost accumulates as integer millicents to stay lock-free; exposed as f64 dollars.
    total_cost_millicents: AtomicU64,
    events_by_type: Mutex<HashMap<EventType, u64>>,
}

pub struct MetricsAggregator {
    max_records: usize,
    records: Mutex<VecDeque<EventRecord>>,
    active_agents: Mutex<HashSet<String>>,
    active_workflows: Mutex<HashSet<String>>,
    cumulative: CumulativeCounters,
}

impl MetricsAggregator {
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records,
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            active_agents: Mutex::new(HashSet::new()),
            active_workflows: Mutex::new(HashSet::new()),
            cumulative: CumulativeCounters::default(),
        }
    }

    /// O(1) append; evicts the oldest record on overflow.
    pub fn record(&self, event: &Event) {
        let record = EventRecord::from_event(event);

        {
            let mut records = self.records.lock();
            if records.len() >= self.max_records {
                records.pop_front();
            }
            records.push_back(record.clone());
        }

        self.update_active_index(event);
        self.update_cumulative(&record);
    }

    fn update_active_index(&self, event: &Event) {
        match event.event_type {
            EventType::AgentInvoked => {
                self.active_agents.lock().insert(event.trace_id.clone());
            }
            EventType::AgentCompleted | EventType::AgentFailed => {
                // Ignored silently if there was no matching open entry, per
                // the aggregator's active-index invariant.
                self.active_agents.lock().remove(&event.trace_id);
            }
            EventType::WorkflowStarted => {
                if let Some(workflow_id) = event.workflow_id() {
                    self.active_workflows.lock().insert(workflow_id.to_string());
                }
            }
            EventType::WorkflowCompleted | EventType::WorkflowFailed => {
                if let Some(workflow_id) = event.workflow_id() {
                    self.active_workflows.lock().remove(workflow_id);
                }
            }
            _ => {}
        }
    }

    fn update_cumulative(&self, record: &EventRecord) {
        self.cumulative.total_events.fetch_add(1, Ordering::Relaxed);
        if let Some(tokens) = record.tokens {
            self.cumulative.total_tokens.fetch_add(tokens, Ordering::Relaxed);
        }
        if let Some(cost) = record.cost {
            let millicents = (cost * 100_000.0).round() as u64;
            self.cumulative
                .total_cost_millicents
                .fetch_add(millicents, Ordering::Relaxed);
        }
        *self
            .cumulative
            .events_by_type
            .lock()
            .entry(record.event_type)
            .or_insert(0) += 1;
    }

    /// Computes a snapshot over the tail of the FIFO covering
    /// `[now - window_seconds, now]`.
    pub fn snapshot(&self, window_seconds: u64) -> MetricsSnapshot {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::seconds(window_seconds as i64);

        let records = self.records.lock();
        let windowed: Vec<&EventRecord> = records
            .iter()
            .filter(|record| record.timestamp >= cutoff && record.timestamp <= now)
            .collect();

        let total_events = windowed.len();
        let mut events_by_type: HashMap<EventType, usize> = HashMap::new();
        let mut durations: Vec<u64> = Vec::new();
        let mut total_tokens = 0u64;
        let mut total_cost = 0f64;
        let mut agents_invoked = 0usize;

        for record in &windowed {
            *events_by_type.entry(record.event_type).or_insert(0) += 1;
            if record.event_type == EventType::AgentInvoked {
                agents_invoked += 1;
            }
            if record.event_type == EventType::AgentCompleted {
                if let Some(duration) = record.duration_ms {
                    durations.push(duration);
                }
            }
            if let Some(tokens) = record.tokens {
                total_tokens += tokens;
            }
            if let Some(cost) = record.cost {
                total_cost += cost;
            }
        }
        durations.sort_unstable();

        let window = window_seconds.max(1) as f64;
        MetricsSnapshot {
            window_seconds,
            total_events,
            events_by_type,
            agents_active: self.active_agents.lock().len(),
            workflows_active: self.active_workflows.lock().len(),
            mean_duration_ms: mean(&durations),
            p50_duration_ms: nearest_rank_percentile(&durations, 0.50),
            p95_duration_ms: nearest_rank_percentile(&durations, 0.95),
            p99_duration_ms: nearest_rank_percentile(&durations, 0.99),
            total_tokens,
            total_cost,
            events_per_second: total_events as f64 / window,
            agents_per_minute: agents_invoked as f64 / (window / 60.0),
            tokens_per_second: total_tokens as f64 / window,
            cost_per_hour: total_cost / (window / 3_600.0),
        }
    }

    pub fn all_snapshots(&self, windows: &[u64]) -> Vec<MetricsSnapshot> {
        windows.iter().map(|window| self.snapshot(*window)).collect()
    }

    pub fn cumulative(&self) -> CumulativeStats {
        CumulativeStats {
            total_events: self.cumulative.total_events.load(Ordering::Relaxed),
            total_tokens: self.cumulative.total_tokens.load(Ordering::Relaxed),
            total_cost: self.cumulative.total_cost_millicents.load(Ordering::Relaxed) as f64
                / 100_000.0,
            events_by_type: self.cumulative.events_by_type.lock().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-rank percentile: index `⌈pct·n⌉ − 1`, clamped into bounds.
/// `sorted` must already be sorted ascending. Returns 0 when empty.
fn nearest_rank_percentile(sorted: &[u64], pct: f64) -> u64 {
    let n = sorted.len();
    if n == 0 {
        return 0;
    }
    let rank = (pct * n as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(n - 1);
    sorted[index]
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<u64>() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwire_types::payload;
    use serde_json::json;

    fn agent_event(event_type: EventType, trace_id: &str, payload: serde_json::Value) -> Event {
        Event::new(event_type, "session-1", trace_id, payload).unwrap()
    }

    #[test]
    fn fifo_never_exceeds_max_records() {
        let aggregator = MetricsAggregator::new(10);
        for i in 0..50 {
            aggregator.record(&agent_event(
                EventType::AgentInvoked,
                &format!("t{i}"),
                json!({}),
            ));
        }
        assert_eq!(aggregator.len(), 10);
    }

    #[test]
    fn percentiles_match_nearest_rank_formula() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(nearest_rank_percentile(&sorted, 0.50), 50);
        assert_eq!(nearest_rank_percentile(&sorted, 0.95), 95);
        assert_eq!(nearest_rank_percentile(&sorted, 0.99), 99);
        assert_eq!(nearest_rank_percentile(&[], 0.50), 0);
    }

    #[test]
    fn active_agent_index_tracks_invoked_and_completed_pairs() {
        let aggregator = MetricsAggregator::new(100);
        aggregator.record(&agent_event(
            EventType::AgentInvoked,
            "trace-a",
            payload::agent_invoked("scout", None, None, &[], None, None),
        ));
        assert_eq!(aggregator.snapshot(60).agents_active, 1);

        aggregator.record(&agent_event(
            EventType::AgentCompleted,
            "trace-a",
            payload::agent_completed("scout", 10, None, None, None),
        ));
        assert_eq!(aggregator.snapshot(60).agents_active, 0);
    }

    #[test]
    fn unmatched_close_is_ignored_for_active_count_but_still_recorded() {
        let aggregator = MetricsAggregator::new(100);
        aggregator.record(&agent_event(
            EventType::AgentCompleted,
            "trace-orphan",
            payload::agent_completed("scout", 10, None, None, None),
        ));
        assert_eq!(aggregator.snapshot(60).agents_active, 0);
        assert_eq!(aggregator.cumulative().total_events, 1);
    }

    #[test]
    fn rate_consistency_matches_total_over_window() {
        let aggregator = MetricsAggregator::new(1000);
        for i in 0..100 {
            aggregator.record(&agent_event(
                EventType::AgentCompleted,
                &format!("t{i}"),
                payload::agent_completed("scout", (i + 1) as u64, None, None, None),
            ));
        }
        let snapshot = aggregator.snapshot(60);
        assert_eq!(snapshot.total_events, 100);
        assert!((snapshot.events_per_second - 100.0 / 60.0).abs() < 1e-9);
        assert_eq!(snapshot.p50_duration_ms, 50);
        assert_eq!(snapshot.p95_duration_ms, 95);
        assert_eq!(snapshot.p99_duration_ms, 99);
    }
}
