//! Configuration store: a single authoritative JSON file loaded at startup,
//! plus environment variable overrides for the streaming host/port (the
//! teacher's multi-layer global/project/managed/env/cli merge is overkill
//! here — this runtime has one deployment-owned file).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleetwire_types::{FleetwireError, RuntimeConfig};
use parking_lot::RwLock;
use tokio::fs;

#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl ConfigStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FleetwireError> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path).await.map_err(|err| {
            FleetwireError::ConfigError(format!(
                "failed to read config file {}: {err}",
                path.display()
            ))
        })?;
        let mut config: RuntimeConfig = serde_json::from_str(&raw)
            .map_err(|err| FleetwireError::ConfigError(format!("invalid config: {err}")))?;

        apply_env_overrides(&mut config);
        validate(&config)?;

        Ok(Self {
            path,
            config: Arc::new(RwLock::new(config)),
        })
    }

    pub fn from_config(config: RuntimeConfig) -> Result<Self, FleetwireError> {
        validate(&config)?;
        Ok(Self {
            path: PathBuf::new(),
            config: Arc::new(RwLock::new(config)),
        })
    }

    pub fn get(&self) -> RuntimeConfig {
        self.config.read().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn apply_env_overrides(config: &mut RuntimeConfig) {
    if let Ok(host) = std::env::var("FLEETWIRE_STREAM_HOST") {
        if !host.trim().is_empty() {
            config.streaming.host = host;
        }
    }
    if let Ok(port) = std::env::var("FLEETWIRE_STREAM_PORT") {
        if let Ok(port) = port.parse() {
            config.streaming.port = port;
        }
    }
}

fn validate(config: &RuntimeConfig) -> Result<(), FleetwireError> {
    for (name, tier) in [
        ("weak", &config.tiers.weak),
        ("base", &config.tiers.base),
        ("strong", &config.tiers.strong),
    ] {
        if tier.candidates.is_empty() {
            return Err(FleetwireError::ConfigError(format!(
                "tier `{name}` has no candidate models"
            )));
        }
    }
    if config.routing.max_upgrade_attempts == 0 {
        return Err(FleetwireError::ConfigError(
            "routing.max_upgrade_attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config_json() -> &'static str {
        r#"{
            "tiers": {
                "weak": {"name":"weak","candidates":[{"name":"gemini-2.5-flash","priority":1,"cost_multiplier":0.0,"provider":"google","context_window":100000}],"max_context_window":100000,"max_task_complexity":3},
                "base": {"name":"base","candidates":[{"name":"claude-haiku","priority":1,"cost_multiplier":1.0,"provider":"anthropic","context_window":200000}],"max_context_window":200000,"max_task_complexity":7},
                "strong": {"name":"strong","candidates":[{"name":"claude-opus","priority":1,"cost_multiplier":5.0,"provider":"anthropic","context_window":200000}],"max_context_window":200000,"max_task_complexity":10}
            },
            "routing": {"prefer_free_tier": true, "upgrade_on_failure": true, "force_strong_for": []}
        }"#
    }

    #[tokio::test]
    async fn loads_and_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_config_json().as_bytes()).unwrap();
        let store = ConfigStore::load(file.path()).await.unwrap();
        let config = store.get();
        assert_eq!(config.streaming.port, 4173);
        assert_eq!(config.metrics.max_records, 10_000);
    }

    #[tokio::test]
    async fn rejects_tier_with_no_candidates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bad = sample_config_json().replace(
            r#""weak": {"name":"weak","candidates":[{"name":"gemini-2.5-flash","priority":1,"cost_multiplier":0.0,"provider":"google","context_window":100000}],"max_context_window":100000,"max_task_complexity":3},"#,
            r#""weak": {"name":"weak","candidates":[],"max_context_window":100000,"max_task_complexity":3},"#,
        );
        file.write_all(bad.as_bytes()).unwrap();
        let err = ConfigStore::load(file.path()).await.unwrap_err();
        assert!(matches!(err, FleetwireError::ConfigError(_)));
    }
}
