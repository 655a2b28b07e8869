use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTierName {
    Weak,
    Base,
    Strong,
}

impl ModelTierName {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTierName::Weak => "weak",
            ModelTierName::Base => "base",
            ModelTierName::Strong => "strong",
        }
    }

    /// One step up; `strong` stays `strong`.
    pub fn upgrade(self) -> Self {
        match self {
            ModelTierName::Weak => ModelTierName::Base,
            ModelTierName::Base => ModelTierName::Strong,
            ModelTierName::Strong => ModelTierName::Strong,
        }
    }

    /// One step down; `weak` stays `weak`.
    pub fn downgrade(self) -> Self {
        match self {
            ModelTierName::Weak => ModelTierName::Weak,
            ModelTierName::Base => ModelTierName::Weak,
            ModelTierName::Strong => ModelTierName::Base,
        }
    }
}

impl std::fmt::Display for ModelTierName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a tier's priority-ordered candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateModel {
    pub name: String,
    pub priority: u32,
    pub cost_multiplier: f64,
    pub provider: String,
    pub context_window: u64,
}

impl CandidateModel {
    pub fn is_free(&self) -> bool {
        self.cost_multiplier == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: ModelTierName,
    pub candidates: Vec<CandidateModel>,
    pub max_context_window: u64,
    pub max_task_complexity: u32,
}

/// Input to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    #[serde(rename = "type")]
    pub task_type: String,
    pub context_tokens: u64,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    pub complexity_score: u32,
    pub routing_reason: String,
    pub free_tier: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub model_name: String,
    pub tier_name: ModelTierName,
    pub metadata: RoutingMetadata,
}
