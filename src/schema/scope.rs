use serde::{Deserialize, Serialize};

/// Wildcard marker accepted in any scope list.
pub const WILDCARD: &str = "*";

/// Applicability scope shared by lexeme lists, grammars, and profiles.
///
/// An empty list or a list containing `*` matches anything. A query that
/// leaves a dimension unspecified (`None`) also matches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub cultures: Vec<String>,
    #[serde(default)]
    pub entity_kinds: Vec<String>,
}

impl Scope {
    /// A scope that matches every culture and entity kind.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn culture(culture: &str) -> Self {
        Self {
            cultures: vec![culture.to_string()],
            entity_kinds: Vec::new(),
        }
    }

    pub fn matches(&self, culture: Option<&str>, entity_kind: Option<&str>) -> bool {
        dimension_matches(&self.cultures, culture) && dimension_matches(&self.entity_kinds, entity_kind)
    }

    /// True when neither dimension is restricted.
    pub fn is_universal(&self) -> bool {
        is_open(&self.cultures) && is_open(&self.entity_kinds)
    }
}

fn is_open(values: &[String]) -> bool {
    values.is_empty() || values.iter().any(|v| v == WILDCARD)
}

fn dimension_matches(values: &[String], query: Option<&str>) -> bool {
    match query {
        None => true,
        Some(q) => is_open(values) || values.iter().any(|v| v == q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_matches_everything() {
        let scope = Scope::any();
        assert!(scope.matches(Some("elven"), Some("npc")));
        assert!(scope.matches(None, None));
        assert!(scope.is_universal());
    }

    #[test]
    fn wildcard_matches_everything() {
        let scope = Scope {
            cultures: vec!["*".to_string()],
            entity_kinds: vec!["location".to_string()],
        };
        assert!(scope.matches(Some("dwarven"), Some("location")));
        assert!(!scope.matches(Some("dwarven"), Some("npc")));
        assert!(!scope.is_universal());
    }

    #[test]
    fn exact_culture_match() {
        let scope = Scope::culture("elven");
        assert!(scope.matches(Some("elven"), Some("npc")));
        assert!(!scope.matches(Some("dwarven"), None));
        assert!(scope.matches(None, None));
    }
}
