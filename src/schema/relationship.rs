use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::EntityId;

/// Relationship keys understood by `context:<key>` grammar tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Leader,
    Founder,
    Discoverer,
    Mentor,
    Resident,
    Location,
    Faction,
    Birthplace,
    Stronghold,
    Origin,
    Custom(String),
}

impl RelationshipKind {
    /// Parse a context key. Unknown keys become `Custom`.
    pub fn parse(key: &str) -> Self {
        match key {
            "leader" => Self::Leader,
            "founder" => Self::Founder,
            "discoverer" => Self::Discoverer,
            "mentor" => Self::Mentor,
            "resident" => Self::Resident,
            "location" => Self::Location,
            "faction" => Self::Faction,
            "birthplace" => Self::Birthplace,
            "stronghold" => Self::Stronghold,
            "origin" => Self::Origin,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Leader => "leader",
            Self::Founder => "founder",
            Self::Discoverer => "discoverer",
            Self::Mentor => "mentor",
            Self::Resident => "resident",
            Self::Location => "location",
            Self::Faction => "faction",
            Self::Birthplace => "birthplace",
            Self::Stronghold => "stronghold",
            Self::Origin => "origin",
            Self::Custom(key) => key,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, directional edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationshipKind,
}
