/// Pipeline integration tests: entity in, name out.
use naming_engine::core::context::WorldContext;
use naming_engine::core::grammar::GrammarError;
use naming_engine::core::markov::{MarkovLibrary, MarkovTrainer};
use naming_engine::schema::lexeme::LexemeList;
use naming_engine::schema::relationship::RelationshipKind;
use naming_engine::schema::scope::Scope;
use naming_engine::{Entity, EntityId, NamingEngine, NamingError, Prominence};
use rustc_hash::FxHashSet;
use std::collections::HashMap;

fn clan_models() -> MarkovLibrary {
    let corpus = std::fs::read_to_string("culture_data/corpora/dwarven_clans.txt").unwrap();
    let mut library = MarkovLibrary::new();
    library.insert("dwarven_clans", MarkovTrainer::train(&corpus, 3));
    library
}

fn engine(seed: u64) -> NamingEngine {
    NamingEngine::builder()
        .seed(seed)
        .cultures_dir("culture_data")
        .with_markov_library(clan_models())
        .default_profile("common")
        .build()
        .unwrap()
}

#[test]
fn same_seed_same_names() {
    let elf = Entity::new(1, "npc").with_culture("elven");
    let mut a = engine(42);
    let mut b = engine(42);
    let first: Vec<String> = (0..30).map(|_| a.generate(&elf, None).unwrap()).collect();
    let second: Vec<String> = (0..30).map(|_| b.generate(&elf, None).unwrap()).collect();
    assert_eq!(first, second);

    let mut c = engine(43);
    let third: Vec<String> = (0..30).map(|_| c.generate(&elf, None).unwrap()).collect();
    assert_ne!(first, third);
}

#[test]
fn ordinary_elves_get_single_word_names() {
    let elf = Entity::new(1, "npc").with_culture("elven");
    let mut engine = engine(1);
    for name in engine.generate_batch(&elf, 40, None).unwrap() {
        assert!(!name.contains(' '), "{}", name);
        assert!(name.chars().next().unwrap().is_uppercase(), "{}", name);
    }
}

#[test]
fn legendary_elves_get_epithets() {
    let elf = Entity::new(1, "npc")
        .with_culture("elven")
        .with_prominence(Prominence::Mythic);
    let mut engine = engine(2);
    for _ in 0..20 {
        let name = engine.generate(&elf, None).unwrap();
        assert!(name.contains(" the "), "{}", name);
    }
}

#[test]
fn places_use_founder_from_world() {
    let founder = Entity::new(10, "npc").with_culture("elven").named("Ithilwen");
    let glade = Entity::new(11, "location")
        .with_culture("elven")
        .with_tags(&["place"])
        .related(RelationshipKind::Founder, EntityId(10));
    let entities: HashMap<EntityId, Entity> =
        [founder, glade.clone()].into_iter().map(|e| (e.id, e)).collect();
    let world = WorldContext::new(&entities);

    let mut engine = engine(3);
    let names = engine.generate_batch(&glade, 30, Some(&world)).unwrap();
    assert!(names.iter().any(|n| n.starts_with("Ithilwen's ")), "{:?}", names);
    assert!(names.iter().all(|n| !n.contains("Unknown")), "{:?}", names);
}

#[test]
fn unresolved_founder_takes_another_alternative() {
    let hold = Entity::new(5, "location")
        .with_culture("dwarven")
        .with_subtype("stronghold");
    let mut engine = engine(4);
    for _ in 0..30 {
        let name = engine.generate(&hold, None).unwrap();
        let (_, holding) = name.split_once(' ').unwrap();
        assert!(["Deep", "Hold", "Forge", "Delve"].contains(&holding), "{}", name);
    }
}

#[test]
fn clan_names_come_from_trained_model() {
    let clan = Entity::new(6, "faction").with_culture("dwarven").with_tags(&["clan"]);
    let mut engine = engine(5);
    for _ in 0..10 {
        let name = engine.generate(&clan, None).unwrap();
        assert!(
            ["Clan", "Kindred", "Hearth"].iter().any(|w| name.ends_with(w)),
            "{}",
            name
        );
    }
}

#[test]
fn clan_names_without_models_surface_error() {
    let clan = Entity::new(6, "faction").with_culture("dwarven").with_tags(&["clan"]);
    let mut engine = NamingEngine::builder().cultures_dir("culture_data").build().unwrap();
    assert!(matches!(
        engine.generate(&clan, None),
        Err(NamingError::Grammar(GrammarError::NoMarkovSource(_)))
    ));
}

#[test]
fn unknown_culture_uses_universal_profile() {
    let stranger = Entity::new(7, "npc").with_culture("human");
    let mut engine = engine(6);
    let names = engine.generate_batch(&stranger, 10, None).unwrap();
    assert_eq!(names.len(), 10);
}

#[test]
fn explicit_profile_overrides_culture() {
    let mut elf = Entity::new(8, "npc").with_culture("elven").with_tags(&["clan"]);
    elf.profile_id = Some("dwarven".to_string());
    let mut engine = engine(7);
    let name = engine.generate(&elf, None).unwrap();
    assert!(["Clan", "Kindred", "Hearth"].iter().any(|w| name.ends_with(w)), "{}", name);
}

#[test]
fn registry_edits_apply_to_later_names() {
    let glade = Entity::new(9, "location").with_culture("elven").with_tags(&["place"]);
    let mut engine = engine(8);
    engine
        .registry_mut()
        .upsert_lexemes(LexemeList::new("elven_features", &["Spring"]).scoped(Scope::culture("elven")))
        .unwrap();

    let names = engine.generate_batch(&glade, 30, None).unwrap();
    let featured: Vec<&String> = names.iter().filter(|n| n.starts_with("The ")).collect();
    assert!(!featured.is_empty(), "{:?}", names);
    assert!(featured.iter().all(|n| n.ends_with(" Spring")), "{:?}", featured);
}

#[test]
fn batch_names_are_distinct() {
    let dwarf = Entity::new(12, "npc").with_culture("dwarven");
    let mut engine = engine(9);
    let names = engine.generate_batch(&dwarf, 50, None).unwrap();
    let unique: FxHashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names.len(), 50);
}

#[test]
fn empty_engine_has_no_profile() {
    let mut engine = NamingEngine::builder().cultures_dir("no_such_dir").build().unwrap();
    let entity = Entity::new(1, "npc");
    assert!(matches!(engine.generate(&entity, None), Err(NamingError::NoProfile(_))));
}
