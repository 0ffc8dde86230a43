use serde::{Deserialize, Serialize};

use super::entity::Prominence;
use super::scope::Scope;

/// One concrete name-generation method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Phonotactic { domain_id: String },
    Grammar { grammar_id: String },
}

impl Strategy {
    pub fn phonotactic(domain_id: &str) -> Self {
        Self::Phonotactic {
            domain_id: domain_id.to_string(),
        }
    }

    pub fn grammar(grammar_id: &str) -> Self {
        Self::Grammar {
            grammar_id: grammar_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedStrategy {
    pub weight: f64,
    pub strategy: Strategy,
}

/// Entity conditions gating a strategy group. Empty lists do not constrain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConditions {
    pub tags: Vec<String>,
    pub require_all_tags: bool,
    pub prominence: Vec<Prominence>,
    pub subtype: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyGroup {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    /// `None` marks the unconditional fallback group.
    #[serde(default)]
    pub conditions: Option<GroupConditions>,
    #[serde(default)]
    pub strategies: Vec<WeightedStrategy>,
}

impl StrategyGroup {
    pub fn fallback(name: &str, strategies: Vec<WeightedStrategy>) -> Self {
        Self {
            name: name.to_string(),
            priority: 0,
            conditions: None,
            strategies,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.conditions.is_none()
    }
}

/// Per-entity selection of naming strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub id: String,
    #[serde(default)]
    pub applies_to: Scope,
    pub strategy_groups: Vec<StrategyGroup>,
}
