//! Naming Engine: procedural culture-specific names for games.
//!
//! Produces names for world entities from per-culture phonotactic domains,
//! weighted context-free grammars, and trained Markov models. Each entity is
//! routed through a strategy profile keyed on its culture, kind, tags, and
//! prominence. Domains can be scored for fitness and tuned automatically.

pub mod core;
pub mod schema;

pub use crate::core::pipeline::{NamingEngine, NamingEngineBuilder, NamingError};
pub use crate::core::registry::{CultureBundle, CultureRegistry, RegistryEdit};
pub use crate::schema::domain::Domain;
pub use crate::schema::entity::{Entity, EntityId, Prominence};
