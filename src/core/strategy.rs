/// Strategy selection: per entity, choose how its name is generated.
use log::debug;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::core::sampling::pick_index;
use crate::schema::entity::{Entity, EntityId};
use crate::schema::profile::{GroupConditions, Strategy, StrategyGroup, StrategyProfile};

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("profile '{profile}': no strategy available for entity {entity:?}")]
    NoStrategyAvailable { profile: String, entity: EntityId },
    #[error("profile '{profile}': {message}")]
    InvalidProfile { profile: String, message: String },
}

impl GroupConditions {
    /// Tags match-any unless `require_all_tags`; prominence and subtype are
    /// set membership. Empty lists do not constrain.
    pub fn matches(&self, entity: &Entity) -> bool {
        let tags_ok = self.tags.is_empty()
            || if self.require_all_tags {
                entity.has_all_tags(&self.tags)
            } else {
                entity.has_any_tag(&self.tags)
            };
        let prominence_ok = self.prominence.is_empty() || self.prominence.contains(&entity.prominence);
        let subtype_ok = self.subtype.is_empty() || self.subtype.iter().any(|s| *s == entity.subtype);
        tags_ok && prominence_ok && subtype_ok
    }
}

impl StrategyGroup {
    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions.as_ref().map_or(true, |c| c.matches(entity))
    }

    /// A group with no strategies or only zero weights cannot be drawn from.
    pub fn is_usable(&self) -> bool {
        self.strategies.iter().any(|s| s.weight > 0.0)
    }
}

/// Load-time checks: at most one unconditioned group, non-negative weights.
pub fn validate_profile(profile: &StrategyProfile) -> Result<(), StrategyError> {
    let fallbacks = profile.strategy_groups.iter().filter(|g| g.is_fallback()).count();
    if fallbacks > 1 {
        return Err(StrategyError::InvalidProfile {
            profile: profile.id.clone(),
            message: format!("{} unconditioned groups, at most one allowed", fallbacks),
        });
    }
    for group in &profile.strategy_groups {
        if let Some(bad) = group.strategies.iter().find(|s| !s.weight.is_finite() || s.weight < 0.0) {
            return Err(StrategyError::InvalidProfile {
                profile: profile.id.clone(),
                message: format!("group '{}' has invalid weight {}", group.name, bad.weight),
            });
        }
    }
    Ok(())
}

/// Groups in evaluation order: descending priority with ties kept in
/// declaration order, unconditioned groups last.
pub fn evaluation_order(profile: &StrategyProfile) -> Vec<&StrategyGroup> {
    let mut conditioned: Vec<&StrategyGroup> = profile.strategy_groups.iter().filter(|g| !g.is_fallback()).collect();
    conditioned.sort_by_key(|g| std::cmp::Reverse(g.priority));
    conditioned.extend(profile.strategy_groups.iter().filter(|g| g.is_fallback()));
    conditioned
}

/// Pick a strategy from the first matching usable group.
pub fn select_strategy<'p>(
    profile: &'p StrategyProfile,
    entity: &Entity,
    rng: &mut StdRng,
) -> Result<&'p Strategy, StrategyError> {
    for group in evaluation_order(profile) {
        if !group.matches(entity) {
            continue;
        }
        if !group.is_usable() {
            debug!(
                "profile '{}': group '{}' matched entity {:?} but has no usable strategy",
                profile.id, group.name, entity.id
            );
            continue;
        }
        let weights: Vec<f64> = group.strategies.iter().map(|s| s.weight).collect();
        if let Some(index) = pick_index(Some(&weights), weights.len(), rng) {
            return Ok(&group.strategies[index].strategy);
        }
    }
    Err(StrategyError::NoStrategyAvailable {
        profile: profile.id.clone(),
        entity: entity.id,
    })
}
