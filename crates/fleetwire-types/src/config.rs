use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::routing::TierConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    pub weak: TierConfig,
    pub base: TierConfig,
    pub strong: TierConfig,
}

fn default_max_upgrade_attempts() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub default_tier: Option<String>,
    #[serde(default)]
    pub prefer_free_tier: bool,
    #[serde(default)]
    pub upgrade_on_failure: bool,
    #[serde(default = "default_max_upgrade_attempts")]
    pub max_upgrade_attempts: u32,
    #[serde(default)]
    pub force_strong_for: HashSet<String>,
}

fn default_max_connections() -> usize {
    1024
}

fn default_send_queue_max() -> usize {
    256
}

fn default_client_grace_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_send_queue_max")]
    pub send_queue_max: usize,
    #[serde(default = "default_client_grace_ms")]
    pub client_grace_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4173
}

fn default_max_records() -> usize {
    10_000
}

fn default_windows() -> Vec<u64> {
    vec![60, 300, 3600]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_windows")]
    pub windows: Vec<u64>,
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub tiers: TiersConfig,
    pub routing: RoutingConfig,
    #[serde(default = "StreamingConfig::default")]
    pub streaming: StreamingConfig,
    #[serde(default = "MetricsConfig::default")]
    pub metrics: MetricsConfig,
    #[serde(default = "CoordinatorConfig::default")]
    pub coordinator: CoordinatorConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            send_queue_max: default_send_queue_max(),
            client_grace_ms: default_client_grace_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            windows: default_windows(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            task_timeout_ms: None,
        }
    }
}
