use serde::{Deserialize, Serialize};

use super::scope::Scope;

/// Where a lexeme list's entries came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexemeSource {
    #[default]
    Manual,
    /// Produced by an external generator (e.g. an LLM pipeline).
    Generated { generator: String },
}

/// A named word list referenced by `slot:<id>` grammar tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexemeList {
    pub id: String,
    pub entries: Vec<String>,
    #[serde(default)]
    pub source: LexemeSource,
    #[serde(default)]
    pub applies_to: Scope,
}

impl LexemeList {
    pub fn new(id: &str, entries: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            entries: entries.iter().map(|s| s.to_string()).collect(),
            source: LexemeSource::Manual,
            applies_to: Scope::any(),
        }
    }

    pub fn scoped(mut self, scope: Scope) -> Self {
        self.applies_to = scope;
        self
    }
}
