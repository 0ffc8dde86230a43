/// Relationship context: maps `context:<key>` tokens to related entity names.
use std::collections::HashMap;

use crate::schema::entity::{Entity, EntityId};
use crate::schema::relationship::RelationshipKind;

/// Resolves a relationship key for an entity to the display name of the
/// related entity, if there is one.
pub trait ContextResolver {
    fn resolve(&self, key: &RelationshipKind, entity: EntityId) -> Option<String>;
}

/// World state passed by the game: every entity that may be referenced.
pub struct WorldContext<'a> {
    pub entities: &'a HashMap<EntityId, Entity>,
}

impl<'a> WorldContext<'a> {
    pub fn new(entities: &'a HashMap<EntityId, Entity>) -> Self {
        Self { entities }
    }
}

impl ContextResolver for WorldContext<'_> {
    /// First relationship of the requested kind whose target exists and has
    /// a non-empty name.
    fn resolve(&self, key: &RelationshipKind, entity: EntityId) -> Option<String> {
        let source = self.entities.get(&entity)?;
        source
            .relationships
            .iter()
            .filter(|r| &r.kind == key)
            .filter_map(|r| self.entities.get(&r.target))
            .map(|target| target.name.clone())
            .find(|name| !name.is_empty())
    }
}

impl ContextResolver for HashMap<RelationshipKind, String> {
    fn resolve(&self, key: &RelationshipKind, _entity: EntityId) -> Option<String> {
        self.get(key).cloned()
    }
}
