//! Plain serializable records consumed by the naming core.

pub mod domain;
pub mod entity;
pub mod lexeme;
pub mod profile;
pub mod relationship;
pub mod scope;
