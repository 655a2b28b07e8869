//! Model Router (C5): deterministic mapping from a task descriptor to a
//! `(model, tier)` pair, driven by a complexity score and a free-tier
//! preference, with upgrade-on-failure and upgrade-on-context-overflow.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use fleetwire_types::{
    CandidateModel, FleetwireError, FleetwireResult, ModelTierName, RoutingConfig,
    RoutingDecision, RoutingMetadata, TaskDescriptor, TiersConfig,
};

fn task_type_base_score(task_type: &str) -> u32 {
    match task_type {
        "log_summary" => 1,
        "file_scan" => 1,
        "syntax_check" => 1,
        "data_extraction" => 1,
        "documentation" => 2,
        "code_implementation" => 3,
        "refactoring" => 3,
        "bug_fix" => 3,
        "test_writing" => 4,
        "code_review" => 4,
        "api_integration" => 5,
        "debugging_complex" => 6,
        "performance_optimization" => 7,
        "planning" => 7,
        "architecture_design" => 9,
        "security_review" => 9,
        "strategic_decision" => 10,
        "production_critical" => 10,
        _ => 3,
    }
}

fn context_bucket(context_tokens: u64) -> u32 {
    if context_tokens <= 10_000 {
        0
    } else if context_tokens <= 50_000 {
        1
    } else if context_tokens <= 100_000 {
        2
    } else {
        3
    }
}

fn file_count_bucket(file_count: usize) -> u32 {
    if file_count <= 3 {
        0
    } else if file_count <= 10 {
        1
    } else {
        2
    }
}

fn tier_for_score(score: u32) -> ModelTierName {
    if score <= 3 {
        ModelTierName::Weak
    } else if score <= 7 {
        ModelTierName::Base
    } else {
        ModelTierName::Strong
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RouterStats {
    pub selections_by_tier: HashMap<ModelTierName, u64>,
    pub upgrades: u64,
    pub downgrades: u64,
    pub free_tier_selections: u64,
    pub total_selections: u64,
}

impl RouterStats {
    pub fn free_tier_share(&self) -> f64 {
        if self.total_selections == 0 {
            0.0
        } else {
            self.free_tier_selections as f64 / self.total_selections as f64
        }
    }
}

struct State {
    // (task_type, tier) -> failure count
    failures: HashMap<(String, ModelTierName), u32>,
    stats: RouterStats,
}

pub struct ModelRouter {
    tiers: TiersConfig,
    routing: RoutingConfig,
    state: Mutex<State>,
}

impl ModelRouter {
    pub fn new(tiers: TiersConfig, routing: RoutingConfig) -> Self {
        Self {
            tiers,
            routing,
            state: Mutex::new(State {
                failures: HashMap::new(),
                stats: RouterStats::default(),
            }),
        }
    }

    fn tier_config(&self, tier: ModelTierName) -> &fleetwire_types::TierConfig {
        match tier {
            ModelTierName::Weak => &self.tiers.weak,
            ModelTierName::Base => &self.tiers.base,
            ModelTierName::Strong => &self.tiers.strong,
        }
    }

    fn failures_at(&self, task_type: &str, tier: ModelTierName) -> u32 {
        self.state
            .lock()
            .failures
            .get(&(task_type.to_string(), tier))
            .copied()
            .unwrap_or(0)
    }

    /// The four-factor complexity score (§4.4), 1-10.
    pub fn complexity_score(&self, task: &TaskDescriptor) -> u32 {
        let base = context_bucket(task.context_tokens)
            + task_type_base_score(&task.task_type)
            + file_count_bucket(task.files.len());
        let tentative_tier = tier_for_score(base);
        let bump = if self.failures_at(&task.task_type, tentative_tier) >= 2 {
            1
        } else {
            0
        };
        (base + bump).clamp(1, 10)
    }

    /// Selects a `(model, tier)` pair for `task`. All candidates in the
    /// selected tier are considered available.
    pub fn select_model(&self, task: &TaskDescriptor) -> FleetwireResult<RoutingDecision> {
        self.select_model_excluding(task, &[])
    }

    /// As `select_model`, but candidates whose name appears in `unavailable`
    /// (quota exhausted, signaled by the caller) are skipped.
    pub fn select_model_excluding(
        &self,
        task: &TaskDescriptor,
        unavailable: &[String],
    ) -> FleetwireResult<RoutingDecision> {
        self.select_model_inner(task, unavailable, self.routing.prefer_free_tier)
    }

    /// As `select_model_excluding`, but free-tier preference is forced on
    /// for this call regardless of `routing.prefer_free_tier` (§4.7: a
    /// session with an observed `cost.budget_warning` force-prefers free
    /// models without yet restricting to them).
    pub fn select_model_preferring_free(
        &self,
        task: &TaskDescriptor,
        unavailable: &[String],
    ) -> FleetwireResult<RoutingDecision> {
        self.select_model_inner(task, unavailable, true)
    }

    fn select_model_inner(
        &self,
        task: &TaskDescriptor,
        unavailable: &[String],
        prefer_free: bool,
    ) -> FleetwireResult<RoutingDecision> {
        let base = context_bucket(task.context_tokens)
            + task_type_base_score(&task.task_type)
            + file_count_bucket(task.files.len());
        let tentative_tier = tier_for_score(base);
        let repeated_failures = self.failures_at(&task.task_type, tentative_tier) >= 2;
        let score = (base + u32::from(repeated_failures)).clamp(1, 10);

        let mut tier = tier_for_score(score);
        let mut routing_reason = "complexity_score".to_string();

        // A task-type/tier pair with two or more recorded failures is
        // promoted a full tier, not just nudged by the score bump above —
        // this is what `routing.upgrade_on_failure` gates.
        if self.routing.upgrade_on_failure && repeated_failures {
            tier = tier.upgrade();
            routing_reason = "upgrade_on_failure".to_string();
        }

        if self.routing.force_strong_for.contains(&task.task_type) {
            tier = ModelTierName::Strong;
            routing_reason = "force_strong".to_string();
        }

        let mut attempts = 0;
        while task.context_tokens > self.tier_config(tier).max_context_window
            && attempts < self.routing.max_upgrade_attempts
            && tier != ModelTierName::Strong
        {
            tier = tier.upgrade();
            routing_reason = "max_context_override".to_string();
            attempts += 1;
        }

        loop {
            match self.pick_candidate(tier, unavailable, prefer_free) {
                Some(candidate) => {
                    let free_tier = candidate.is_free();
                    self.record_selection(tier, free_tier);
                    return Ok(RoutingDecision {
                        model_name: candidate.name,
                        tier_name: tier,
                        metadata: RoutingMetadata {
                            complexity_score: score,
                            routing_reason,
                            free_tier,
                        },
                    });
                }
                None => {
                    if tier == ModelTierName::Strong {
                        return Err(FleetwireError::NoModelAvailable {
                            tier: tier.to_string(),
                        });
                    }
                    tier = tier.upgrade();
                    routing_reason = "tier_exhausted".to_string();
                }
            }
        }
    }

    fn pick_candidate(
        &self,
        tier: ModelTierName,
        unavailable: &[String],
        prefer_free: bool,
    ) -> Option<CandidateModel> {
        let config = self.tier_config(tier);
        let mut candidates: Vec<&CandidateModel> = config
            .candidates
            .iter()
            .filter(|candidate| !unavailable.contains(&candidate.name))
            .collect();
        candidates.sort_by_key(|candidate| candidate.priority);

        if prefer_free {
            if let Some(free) = candidates.iter().find(|candidate| candidate.is_free()) {
                return Some((*free).clone());
            }
        }
        candidates.first().map(|candidate| (*candidate).clone())
    }

    fn record_selection(&self, tier: ModelTierName, free_tier: bool) {
        let mut state = self.state.lock();
        state.stats.total_selections += 1;
        *state.stats.selections_by_tier.entry(tier).or_insert(0) += 1;
        if free_tier {
            state.stats.free_tier_selections += 1;
        }
    }

    pub fn upgrade_tier(&self, current: ModelTierName, _reason: &str) -> ModelTierName {
        self.state.lock().stats.upgrades += 1;
        current.upgrade()
    }

    pub fn downgrade_tier(&self, current: ModelTierName, _reason: &str) -> ModelTierName {
        self.state.lock().stats.downgrades += 1;
        current.downgrade()
    }

    pub fn record_failure(&self, task_type: &str, tier: ModelTierName) {
        *self
            .state
            .lock()
            .failures
            .entry((task_type.to_string(), tier))
            .or_insert(0) += 1;
    }

    pub fn stats(&self) -> RouterStats {
        self.state.lock().stats.clone()
    }

    /// Names of every candidate across all tiers whose `cost_multiplier`
    /// is nonzero. Used to restrict routing to free models only once a
    /// session's cost budget is exceeded.
    pub fn non_free_candidate_names(&self) -> Vec<String> {
        [&self.tiers.weak, &self.tiers.base, &self.tiers.strong]
            .into_iter()
            .flat_map(|tier| tier.candidates.iter())
            .filter(|candidate| !candidate.is_free())
            .map(|candidate| candidate.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwire_types::TierConfig;
    use std::collections::HashSet;

    fn tier(name: ModelTierName, candidates: Vec<CandidateModel>, max_context: u64) -> TierConfig {
        TierConfig {
            name,
            candidates,
            max_context_window: max_context,
            max_task_complexity: 10,
        }
    }

    fn candidate(name: &str, priority: u32, cost_multiplier: f64) -> CandidateModel {
        CandidateModel {
            name: name.to_string(),
            priority,
            cost_multiplier,
            provider: "test".to_string(),
            context_window: 200_000,
        }
    }

    fn router(prefer_free_tier: bool, force_strong_for: HashSet<String>) -> ModelRouter {
        let tiers = TiersConfig {
            weak: tier(
                ModelTierName::Weak,
                vec![candidate("gemini-2.5-flash", 1, 0.0)],
                100_000,
            ),
            base: tier(
                ModelTierName::Base,
                vec![
                    candidate("claude-haiku-free", 1, 0.0),
                    candidate("claude-haiku", 2, 1.0),
                ],
                200_000,
            ),
            strong: tier(
                ModelTierName::Strong,
                vec![candidate("claude-opus", 1, 5.0)],
                200_000,
            ),
        };
        let routing = RoutingConfig {
            default_tier: None,
            prefer_free_tier,
            upgrade_on_failure: true,
            max_upgrade_attempts: 2,
            force_strong_for,
        };
        ModelRouter::new(tiers, routing)
    }

    fn task(task_type: &str, context_tokens: u64, files: usize) -> TaskDescriptor {
        TaskDescriptor {
            task_type: task_type.to_string(),
            context_tokens,
            files: (0..files).map(|i| format!("file{i}")).collect(),
        }
    }

    #[test]
    fn s1_simple_log_task_routes_to_weak_free() {
        let router = router(true, HashSet::new());
        let decision = router.select_model(&task("log_summary", 5_000, 1)).unwrap();
        assert_eq!(decision.metadata.complexity_score, 1);
        assert_eq!(decision.tier_name, ModelTierName::Weak);
        assert_eq!(decision.model_name, "gemini-2.5-flash");
    }

    #[test]
    fn s2_standard_implementation_routes_to_base() {
        let router = router(true, HashSet::new());
        let decision = router
            .select_model(&task("code_implementation", 20_000, 3))
            .unwrap();
        assert_eq!(decision.metadata.complexity_score, 4);
        assert_eq!(decision.tier_name, ModelTierName::Base);
        assert_eq!(decision.model_name, "claude-haiku-free");
    }

    #[test]
    fn s3_architecture_forces_strong() {
        let router = router(true, HashSet::new());
        let decision = router
            .select_model(&task("architecture_design", 150_000, 20))
            .unwrap();
        assert_eq!(decision.tier_name, ModelTierName::Strong);
        assert_eq!(decision.model_name, "claude-opus");
    }

    #[test]
    fn s4_upgrade_on_quality_failure() {
        let router = router(true, HashSet::new());
        router.record_failure("code_review", ModelTierName::Base);
        router.record_failure("code_review", ModelTierName::Base);
        let decision = router
            .select_model(&task("code_review", 30_000, 2))
            .unwrap();
        assert_eq!(decision.tier_name, ModelTierName::Strong);
    }

    #[test]
    fn force_strong_override_wins_regardless_of_score() {
        let mut force = HashSet::new();
        force.insert("log_summary".to_string());
        let router = router(true, force);
        let decision = router.select_model(&task("log_summary", 100, 1)).unwrap();
        assert_eq!(decision.tier_name, ModelTierName::Strong);
        assert_eq!(decision.metadata.routing_reason, "force_strong");
    }

    #[test]
    fn free_tier_preference_returns_free_candidate_when_present() {
        let router = router(true, HashSet::new());
        let decision = router
            .select_model(&task("code_implementation", 1_000, 1))
            .unwrap();
        assert!(decision.metadata.free_tier);
    }

    #[test]
    fn complexity_is_monotonic_in_context_tokens_and_file_count() {
        let router = router(false, HashSet::new());
        let low = router.complexity_score(&task("code_implementation", 1_000, 1));
        let high = router.complexity_score(&task("code_implementation", 60_000, 1));
        assert!(low <= high);

        let few_files = router.complexity_score(&task("code_implementation", 1_000, 1));
        let many_files = router.complexity_score(&task("code_implementation", 1_000, 12));
        assert!(few_files <= many_files);
    }

    #[test]
    fn context_overflow_upgrades_tier() {
        let router = router(true, HashSet::new());
        let decision = router
            .select_model(&task("log_summary", 150_000, 1))
            .unwrap();
        assert_ne!(decision.tier_name, ModelTierName::Weak);
    }

    #[test]
    fn no_model_available_when_all_candidates_unavailable_at_strong() {
        let router = router(true, HashSet::new());
        let err = router
            .select_model_excluding(
                &task("strategic_decision", 1_000, 1),
                &["claude-opus".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, FleetwireError::NoModelAvailable { .. }));
    }
}
