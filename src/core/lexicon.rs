/// Lexeme lookup: scoped resolution of named word lists.
use rustc_hash::FxHashSet;

use crate::schema::lexeme::LexemeList;

/// Resolves `slot:<id>` references into candidate words.
///
/// Implementations merge every list with the requested id whose scope
/// matches the culture and entity kind (exact or wildcard). An LLM-backed
/// source can implement this trait directly.
pub trait LexemeRegistry {
    fn resolve(&self, id: &str, culture: Option<&str>, entity_kind: Option<&str>) -> Vec<&str>;

    /// Whether any list with this id exists at all, regardless of scope.
    fn contains(&self, id: &str) -> bool;
}

/// In-memory lexeme lists.
#[derive(Debug, Clone, Default)]
pub struct LexemeSet {
    lists: Vec<LexemeList>,
}

impl LexemeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lists(lists: Vec<LexemeList>) -> Self {
        Self { lists }
    }

    pub fn insert(&mut self, list: LexemeList) {
        self.lists.push(list);
    }

    pub fn lists(&self) -> &[LexemeList] {
        &self.lists
    }
}

pub(crate) fn resolve_from<'a>(
    lists: impl Iterator<Item = &'a LexemeList>,
    id: &str,
    culture: Option<&str>,
    entity_kind: Option<&str>,
) -> Vec<&'a str> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for list in lists.filter(|l| l.id == id && l.applies_to.matches(culture, entity_kind)) {
        for entry in &list.entries {
            if seen.insert(entry.as_str()) {
                out.push(entry.as_str());
            }
        }
    }
    out
}

impl LexemeRegistry for LexemeSet {
    fn resolve(&self, id: &str, culture: Option<&str>, entity_kind: Option<&str>) -> Vec<&str> {
        resolve_from(self.lists.iter(), id, culture, entity_kind)
    }

    fn contains(&self, id: &str) -> bool {
        self.lists.iter().any(|l| l.id == id)
    }
}
