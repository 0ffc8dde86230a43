/// Frontier Cultures demo: names a small frontier settlement cluster.
///
/// Elven and dwarven founders, the places they found, a clan, and a
/// legendary figure, each routed through its culture's strategy profile.
/// Finishes by tuning the dwarven domain with a short hill climb.
///
/// Run with: cargo run --example frontier_cultures
use naming_engine::core::context::WorldContext;
use naming_engine::core::fitness::{FitnessSettings, FitnessWeights};
use naming_engine::core::markov::{MarkovLibrary, MarkovTrainer};
use naming_engine::core::optimizer::{optimize, Algorithm, AlgorithmConfig};
use naming_engine::schema::relationship::RelationshipKind;
use naming_engine::{Entity, EntityId, NamingEngine, Prominence};
use std::collections::HashMap;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // --- Train the clan model used by `markov:` tokens ---
    let corpus = std::fs::read_to_string("culture_data/corpora/dwarven_clans.txt")
        .expect("Failed to read dwarven clan corpus");
    let mut markov = MarkovLibrary::new();
    markov.insert("dwarven_clans", MarkovTrainer::train(&corpus, 3));

    let mut engine = NamingEngine::builder()
        .seed(1847)
        .cultures_dir("culture_data")
        .with_markov_library(markov)
        .default_profile("common")
        .build()
        .expect("Failed to build engine");

    // --- Founders first: places reference them by name ---
    let mut entities: HashMap<EntityId, Entity> = HashMap::new();
    let mut elf = Entity::new(1, "npc").with_culture("elven");
    elf.name = engine.generate(&elf, None).expect("elf name");
    let mut dwarf = Entity::new(2, "npc").with_culture("dwarven");
    dwarf.name = engine.generate(&dwarf, None).expect("dwarf name");
    println!("Founders: {} and {}", elf.name, dwarf.name);
    entities.insert(elf.id, elf);
    entities.insert(dwarf.id, dwarf);

    let glade = Entity::new(3, "location")
        .with_culture("elven")
        .with_tags(&["place"])
        .related(RelationshipKind::Founder, EntityId(1));
    let hold = Entity::new(4, "location")
        .with_culture("dwarven")
        .with_subtype("stronghold")
        .related(RelationshipKind::Founder, EntityId(2));
    let clan = Entity::new(5, "faction").with_culture("dwarven").with_tags(&["clan"]);
    let hero = Entity::new(6, "npc")
        .with_culture("elven")
        .with_prominence(Prominence::Mythic);
    let traveller = Entity::new(7, "npc").with_culture("human");

    let world = WorldContext::new(&entities);
    for (label, entity) in [
        ("Elven places", &glade),
        ("Dwarven holds", &hold),
        ("Clans", &clan),
        ("Legends", &hero),
        ("Travellers", &traveller),
    ] {
        println!("\n--- {} ---", label);
        match engine.generate_batch(entity, 5, Some(&world)) {
            Ok(names) => names.iter().for_each(|n| println!("  {}", n)),
            Err(e) => println!("  (failed: {})", e),
        }
    }

    // --- Tune the dwarven domain against its neighbours ---
    let snapshot = engine.registry().snapshot();
    let dwarven = snapshot.domain("dwarven").expect("dwarven domain");
    let siblings: Vec<_> = snapshot.siblings_of("dwarven").into_iter().cloned().collect();
    let settings = FitnessSettings {
        required_names: 60,
        ..FitnessSettings::default()
    };
    let config = AlgorithmConfig {
        iterations: 25,
        seed: 1847,
        ..AlgorithmConfig::for_algorithm(Algorithm::Hillclimb)
    };
    let result = optimize(dwarven, &settings, &FitnessWeights::default(), &config, &siblings, None)
        .expect("optimization");
    println!(
        "\nDwarven fitness: {:.3} -> {:.3} after {} iterations",
        result.initial_fitness, result.final_fitness, result.iterations_run
    );
}
