/// The naming pipeline: Entity → profile → strategy → name.
///
/// Wires together the culture registry, strategy selection, phonotactic
/// synthesis, grammar expansion, and the Markov library.
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::context::ContextResolver;
use crate::core::grammar::{ExpandContext, GrammarError, DEFAULT_CONTEXT_FALLBACK, DEFAULT_MAX_DEPTH};
use crate::core::markov::{MarkovError, MarkovLibrary};
use crate::core::phonotactics::synthesize;
use crate::core::registry::{CultureRegistry, RegistryError, RegistrySnapshot};
use crate::core::sampling::derive_seed;
use crate::core::strategy::{select_strategy, StrategyError};
use crate::schema::domain::DomainError;
use crate::schema::entity::{Entity, EntityId};
use crate::schema::profile::{Strategy, StrategyProfile};

/// Draws allowed per requested name in `generate_batch`.
const BATCH_ATTEMPT_FACTOR: usize = 8;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("markov error: {0}")]
    Markov(#[from] MarkovError),
    #[error("no naming profile applies to entity {0:?}")]
    NoProfile(EntityId),
    #[error("profile '{0}' not found")]
    UnknownProfile(String),
    #[error("strategy references unknown domain '{0}'")]
    UnknownDomain(String),
    #[error("strategy references unknown grammar '{0}'")]
    UnknownGrammar(String),
}

/// The top-level naming engine. Built via `NamingEngine::builder()`.
pub struct NamingEngine {
    registry: CultureRegistry,
    markov: MarkovLibrary,
    default_profile: Option<String>,
    max_depth: usize,
    context_fallback: Option<String>,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `NamingEngine`.
pub struct NamingEngineBuilder {
    cultures_dir: Option<PathBuf>,
    markov_models_dir: Option<PathBuf>,
    default_profile: Option<String>,
    max_depth: usize,
    context_fallback: Option<String>,
    seed: u64,
    /// Directly provided registry (for use without files).
    registry: Option<CultureRegistry>,
    /// Directly provided markov models (for use without files).
    markov: Option<MarkovLibrary>,
}

impl NamingEngine {
    pub fn builder() -> NamingEngineBuilder {
        NamingEngineBuilder {
            cultures_dir: None,
            markov_models_dir: None,
            default_profile: None,
            max_depth: DEFAULT_MAX_DEPTH,
            context_fallback: Some(DEFAULT_CONTEXT_FALLBACK.to_string()),
            seed: 0,
            registry: None,
            markov: None,
        }
    }

    pub fn registry(&self) -> &CultureRegistry {
        &self.registry
    }

    /// Edit cultures in place. Names generated afterwards see the edits.
    pub fn registry_mut(&mut self) -> &mut CultureRegistry {
        &mut self.registry
    }

    pub fn markov(&self) -> &MarkovLibrary {
        &self.markov
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate one name for an entity. `world` resolves `context:` tokens.
    pub fn generate(&mut self, entity: &Entity, world: Option<&dyn ContextResolver>) -> Result<String, NamingError> {
        let mut rng = StdRng::seed_from_u64(derive_seed(self.seed, self.generation_count));
        self.generation_count += 1;

        let snapshot = self.registry.snapshot();
        let profile = self.resolve_profile(&snapshot, entity)?;
        let strategy = match select_strategy(profile, entity, &mut rng) {
            Ok(strategy) => strategy.clone(),
            Err(e @ StrategyError::NoStrategyAvailable { .. }) => {
                let default = self
                    .default_profile
                    .as_deref()
                    .filter(|id| *id != profile.id)
                    .and_then(|id| snapshot.profile(id));
                match default {
                    Some(default) => {
                        debug!("{}; falling back to profile '{}'", e, default.id);
                        select_strategy(default, entity, &mut rng)?.clone()
                    }
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        match self.run_strategy(&snapshot, &strategy, entity, world, &mut rng) {
            Err(NamingError::Grammar(GrammarError::RecursionLimit(depth))) => {
                let domain = entity
                    .culture
                    .as_deref()
                    .and_then(|c| snapshot.domains_for_culture(c).into_iter().next());
                match domain {
                    Some(domain) => {
                        warn!(
                            "grammar expansion for entity {:?} exceeded depth {}, using domain '{}'",
                            entity.id, depth, domain.id
                        );
                        Ok(synthesize(domain, &mut rng)?)
                    }
                    None => Err(GrammarError::RecursionLimit(depth).into()),
                }
            }
            other => other,
        }
    }

    /// Generate up to `count` distinct names. Fewer are returned when the
    /// entity's strategies cannot produce that many.
    pub fn generate_batch(
        &mut self,
        entity: &Entity,
        count: usize,
        world: Option<&dyn ContextResolver>,
    ) -> Result<Vec<String>, NamingError> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::with_capacity(count);
        for _ in 0..count * BATCH_ATTEMPT_FACTOR {
            if names.len() == count {
                break;
            }
            let name = self.generate(entity, world)?;
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
        if names.len() < count {
            debug!(
                "entity {:?}: only {} of {} distinct names available",
                entity.id,
                names.len(),
                count
            );
        }
        Ok(names)
    }

    /// Explicit profile id, else first profile scoped to the entity, else
    /// the default profile.
    fn resolve_profile<'s>(
        &self,
        snapshot: &'s RegistrySnapshot,
        entity: &Entity,
    ) -> Result<&'s StrategyProfile, NamingError> {
        if let Some(id) = &entity.profile_id {
            return snapshot
                .profile(id)
                .ok_or_else(|| NamingError::UnknownProfile(id.clone()));
        }
        if let Some(profile) = snapshot.profile_for(entity.culture.as_deref(), Some(entity.kind.as_str())) {
            return Ok(profile);
        }
        self.default_profile
            .as_deref()
            .and_then(|id| snapshot.profile(id))
            .ok_or(NamingError::NoProfile(entity.id))
    }

    fn run_strategy(
        &self,
        snapshot: &RegistrySnapshot,
        strategy: &Strategy,
        entity: &Entity,
        world: Option<&dyn ContextResolver>,
        rng: &mut StdRng,
    ) -> Result<String, NamingError> {
        match strategy {
            Strategy::Phonotactic { domain_id } => {
                let domain = snapshot
                    .domain(domain_id)
                    .ok_or_else(|| NamingError::UnknownDomain(domain_id.clone()))?;
                Ok(synthesize(domain, rng)?)
            }
            Strategy::Grammar { grammar_id } => {
                let grammar = snapshot
                    .grammar(grammar_id)
                    .ok_or_else(|| NamingError::UnknownGrammar(grammar_id.clone()))?;
                let mut ctx = ExpandContext::new(snapshot, snapshot)
                    .for_scope(entity.culture.as_deref(), Some(entity.kind.as_str()))
                    .with_max_depth(self.max_depth)
                    .with_context_fallback(self.context_fallback.as_deref());
                if !self.markov.is_empty() {
                    ctx = ctx.with_markov(&self.markov);
                }
                if let Some(world) = world {
                    ctx = ctx.with_resolver(world, entity.id);
                }
                Ok(grammar.expand_start(&ctx, rng)?)
            }
        }
    }
}

impl NamingEngineBuilder {
    /// Directory of culture bundle `.ron` files.
    pub fn cultures_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.cultures_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Directory of trained Markov model `.ron` files, keyed by file stem.
    pub fn markov_models_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.markov_models_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Profile used when no other applies or the chosen one has nothing usable.
    pub fn default_profile(mut self, id: &str) -> Self {
        self.default_profile = Some(id.to_string());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Literal for unresolvable `context:` tokens. `None` makes them errors.
    pub fn context_fallback(mut self, fallback: Option<&str>) -> Self {
        self.context_fallback = fallback.map(str::to_string);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide a registry directly (for use without files).
    pub fn with_registry(mut self, registry: CultureRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Provide markov models directly (for use without files).
    pub fn with_markov_library(mut self, markov: MarkovLibrary) -> Self {
        self.markov = Some(markov);
        self
    }

    pub fn build(self) -> Result<NamingEngine, NamingError> {
        let mut registry = self.registry.unwrap_or_default();
        let mut markov = self.markov.unwrap_or_default();

        if let Some(dir) = &self.cultures_dir {
            if dir.exists() {
                registry.load_from_ron_dir(dir)?;
            } else {
                warn!("cultures directory {} does not exist", dir.display());
            }
        }
        if let Some(dir) = &self.markov_models_dir {
            if dir.exists() {
                markov.load_dir(dir)?;
            } else {
                warn!("markov model directory {} does not exist", dir.display());
            }
        }
        if let Some(id) = &self.default_profile {
            if registry.snapshot().profile(id).is_none() {
                return Err(NamingError::UnknownProfile(id.clone()));
            }
        }

        Ok(NamingEngine {
            registry,
            markov,
            default_profile: self.default_profile,
            max_depth: self.max_depth,
            context_fallback: self.context_fallback,
            seed: self.seed,
            generation_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grammar::Grammar;
    use crate::core::registry::RegistryEdit;
    use crate::schema::domain::{Domain, Phonology};
    use crate::schema::lexeme::LexemeList;
    use crate::schema::profile::{GroupConditions, StrategyGroup, WeightedStrategy};
    use crate::schema::relationship::RelationshipKind;
    use crate::schema::scope::Scope;
    use std::collections::HashMap;

    fn weighted(strategy: Strategy) -> WeightedStrategy {
        WeightedStrategy { weight: 1.0, strategy }
    }

    fn build_registry() -> CultureRegistry {
        let mut phonology = Phonology::new(&["g", "r", "k", "z"], &["a", "u"]);
        phonology.length_range = (3, 6);
        let orcish = Domain::new("orcish", "orcs", phonology);

        let holds = Grammar::from_rules(
            "holds",
            "name",
            &[("name", &["domain:orcish^gar", "context:founder^'s slot:holds"])],
        )
        .unwrap();
        let runaway = Grammar::from_rules("runaway", "chain", &[("chain", &["chain chain", "end"])]).unwrap();

        let orc_people = StrategyProfile {
            id: "orc_people".to_string(),
            applies_to: Scope::culture("orcs"),
            strategy_groups: vec![
                StrategyGroup {
                    name: "strongholds".to_string(),
                    priority: 10,
                    conditions: Some(GroupConditions {
                        subtype: vec!["stronghold".to_string()],
                        ..Default::default()
                    }),
                    strategies: vec![weighted(Strategy::grammar("holds"))],
                },
                StrategyGroup {
                    name: "cursed".to_string(),
                    priority: 5,
                    conditions: Some(GroupConditions {
                        tags: vec!["cursed".to_string()],
                        ..Default::default()
                    }),
                    strategies: vec![weighted(Strategy::grammar("runaway"))],
                },
                StrategyGroup {
                    name: "nobody".to_string(),
                    priority: 1,
                    conditions: Some(GroupConditions {
                        tags: vec!["nameless".to_string()],
                        ..Default::default()
                    }),
                    strategies: vec![],
                },
            ],
        };
        let fallback = StrategyProfile {
            id: "fallback".to_string(),
            applies_to: Scope::culture("nobody"),
            strategy_groups: vec![StrategyGroup::fallback(
                "default",
                vec![weighted(Strategy::phonotactic("orcish"))],
            )],
        };

        let mut registry = CultureRegistry::new();
        registry
            .apply(vec![
                RegistryEdit::UpsertDomain(orcish),
                RegistryEdit::UpsertGrammar(holds),
                RegistryEdit::UpsertGrammar(runaway),
                RegistryEdit::UpsertLexemes(LexemeList::new("holds", &["Hold", "Keep"])),
                RegistryEdit::UpsertProfile(orc_people),
                RegistryEdit::UpsertProfile(fallback),
            ])
            .unwrap();
        registry
    }

    fn build_engine(seed: u64) -> NamingEngine {
        NamingEngine::builder()
            .seed(seed)
            .default_profile("fallback")
            .max_depth(6)
            .with_registry(build_registry())
            .build()
            .unwrap()
    }

    #[test]
    fn generate_deterministic_same_seed() {
        let entity = Entity::new(1, "npc").with_culture("orcs");
        let mut a = build_engine(42);
        let mut b = build_engine(42);
        for _ in 0..5 {
            assert_eq!(a.generate(&entity, None).unwrap(), b.generate(&entity, None).unwrap());
        }
    }

    #[test]
    fn no_matching_group_uses_default_profile() {
        let entity = Entity::new(1, "npc").with_culture("orcs");
        let mut engine = build_engine(1);
        let name = engine.generate(&entity, None).unwrap();
        assert!(!name.contains(' '));
        assert!((3..=6).contains(&name.len()), "{}", name);
    }

    #[test]
    fn unusable_group_falls_back() {
        let entity = Entity::new(1, "npc").with_culture("orcs").with_tags(&["nameless"]);
        let mut engine = build_engine(1);
        assert!(engine.generate(&entity, None).is_ok());
    }

    #[test]
    fn grammar_strategy_uses_world_context() {
        let founder = Entity::new(2, "npc").named("Grukk");
        let hold = Entity::new(1, "location")
            .with_culture("orcs")
            .with_subtype("stronghold")
            .related(RelationshipKind::Founder, EntityId(2));
        let entities = HashMap::from([(founder.id, founder), (hold.id, hold.clone())]);
        let world = crate::core::context::WorldContext::new(&entities);
        let mut engine = build_engine(3);
        let names = engine.generate_batch(&hold, 12, Some(&world)).unwrap();
        assert!(names.iter().any(|n| n == "Grukk's Hold" || n == "Grukk's Keep"), "{:?}", names);
        assert!(names.iter().filter(|n| !n.contains(' ')).all(|n| n.ends_with("gar")));
    }

    #[test]
    fn recursion_limit_falls_back_to_culture_domain() {
        let entity = Entity::new(1, "npc").with_culture("orcs").with_tags(&["cursed"]);
        let mut engine = build_engine(0);
        let mut produced = 0;
        for _ in 0..20 {
            // Either the grammar terminates or the orcish domain takes over.
            if engine.generate(&entity, None).is_ok() {
                produced += 1;
            }
        }
        assert_eq!(produced, 20);
    }

    #[test]
    fn unknown_explicit_profile_is_error() {
        let mut entity = Entity::new(1, "npc");
        entity.profile_id = Some("ghost".to_string());
        let mut engine = build_engine(0);
        assert!(matches!(engine.generate(&entity, None), Err(NamingError::UnknownProfile(_))));
    }

    #[test]
    fn batch_is_unique() {
        let entity = Entity::new(1, "npc").with_culture("orcs");
        let mut engine = build_engine(9);
        let names = engine.generate_batch(&entity, 10, None).unwrap();
        let unique: FxHashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn builder_rejects_unknown_default_profile() {
        let result = NamingEngine::builder()
            .default_profile("missing")
            .with_registry(build_registry())
            .build();
        assert!(matches!(result, Err(NamingError::UnknownProfile(_))));
    }

    #[test]
    fn builder_with_seed() {
        let engine = NamingEngine::builder().seed(12345).build().unwrap();
        assert_eq!(engine.seed(), 12345);
    }
}
