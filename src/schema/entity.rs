use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::relationship::{Relationship, RelationshipKind};

/// Newtype wrapper for entity IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// How well-known an entity is in the world. Used by strategy group
/// conditions to give famous entities different naming treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prominence {
    Forgotten,
    Marginal,
    #[default]
    Recognized,
    Renowned,
    Mythic,
}

/// Anything that needs a name: a person, settlement, faction, artifact.
///
/// The engine does not interpret tag semantics: it uses tags solely
/// for strategy group matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Broad category, e.g. "npc", "location", "faction".
    pub kind: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub culture: Option<String>,
    #[serde(default)]
    pub prominence: Prominence,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Explicit naming profile; otherwise one is chosen by culture scope.
    #[serde(default)]
    pub profile_id: Option<String>,
}

impl Entity {
    pub fn new(id: u64, kind: &str) -> Self {
        Self {
            id: EntityId(id),
            name: String::new(),
            kind: kind.to_string(),
            subtype: String::new(),
            culture: None,
            prominence: Prominence::default(),
            tags: FxHashSet::default(),
            relationships: Vec::new(),
            profile_id: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = subtype.to_string();
        self
    }

    pub fn with_culture(mut self, culture: &str) -> Self {
        self.culture = Some(culture.to_string());
        self
    }

    pub fn with_prominence(mut self, prominence: Prominence) -> Self {
        self.prominence = prominence;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn related(mut self, kind: RelationshipKind, target: EntityId) -> Self {
        self.relationships.push(Relationship {
            source: self.id,
            target,
            kind,
        });
        self
    }

    /// Returns true if this entity has the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if this entity has ALL of the given tags.
    pub fn has_all_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag.as_ref()))
    }

    /// Returns true if this entity has at least one of the given tags.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|tag| self.tags.contains(tag.as_ref()))
    }
}
