/// Fitness evaluation integration tests.
use naming_engine::core::fitness::{evaluate_fitness, FitnessEvaluator, FitnessSettings, FitnessWeights};
use naming_engine::schema::domain::Domain;
use naming_engine::CultureRegistry;
use std::path::Path;

fn toy_domain() -> Domain {
    let contents = std::fs::read_to_string("tests/fixtures/toy_domain.ron").unwrap();
    ron::from_str(&contents).unwrap()
}

fn culture_domains() -> Vec<Domain> {
    let mut registry = CultureRegistry::new();
    registry.load_from_ron_dir(Path::new("culture_data")).unwrap();
    registry.snapshot().list_domains().into_iter().cloned().collect()
}

fn settings(required_names: usize, sample_factor: f64) -> FitnessSettings {
    FitnessSettings {
        required_names,
        sample_factor,
        seed: 13,
        parallel: false,
        ..FitnessSettings::default()
    }
}

#[test]
fn quick_settings_fixture_loads() {
    let loaded = FitnessSettings::load_from_ron(Path::new("tests/fixtures/quick_fitness.ron")).unwrap();
    assert_eq!(loaded.required_names, 12);
    assert_eq!(loaded.sample_factor, 1.5);
    assert!(!loaded.parallel);
    assert_eq!(loaded.style_timeout_ms, FitnessSettings::default().style_timeout_ms);
    assert_eq!(loaded.sample_count(), 18);
}

#[test]
fn capacity_never_exceeds_one() {
    let weights = FitnessWeights::default();
    let mut domains = culture_domains();
    domains.push(toy_domain());
    for domain in &domains {
        for required in [1, 3, 10, 60, 300] {
            for factor in [0.5, 1.0, 3.0] {
                let report = evaluate_fitness(domain, &[], &settings(required, factor), &weights).unwrap();
                assert!(
                    (0.0..=1.0).contains(&report.breakdown.capacity),
                    "'{}' required {} factor {}: capacity {}",
                    domain.id,
                    required,
                    factor,
                    report.breakdown.capacity
                );
                assert!(report.names.len() <= required);
            }
        }
    }
}

#[test]
fn smaller_sample_factor_never_finds_more() {
    let weights = FitnessWeights::default();
    for domain in culture_domains().iter().chain([toy_domain()].iter()) {
        let mut previous_unique = 0;
        let mut previous_capacity = 0.0;
        for factor in [0.25, 0.5, 1.0, 2.0, 4.0] {
            let report = evaluate_fitness(domain, &[], &settings(80, factor), &weights).unwrap();
            assert!(
                report.unique_names >= previous_unique,
                "'{}': factor {} found {} unique, fewer than {}",
                domain.id,
                factor,
                report.unique_names,
                previous_unique
            );
            assert!(report.breakdown.capacity >= previous_capacity);
            previous_unique = report.unique_names;
            previous_capacity = report.breakdown.capacity;
        }
    }
}

#[test]
fn culture_siblings_give_separation() {
    let domains = culture_domains();
    let elven = domains.iter().find(|d| d.id == "elven").unwrap();
    let evaluator = FitnessEvaluator::new(&domains, settings(40, 2.0), FitnessWeights::default()).unwrap();
    let report = evaluator.evaluate(elven).unwrap();

    let separation = report.breakdown.separation.unwrap();
    assert!((0.0..=1.0).contains(&separation));
    assert!(separation > 0.0, "elven and dwarven samples should differ");
    assert!((0.0..=1.0).contains(&report.score));
    assert_eq!(evaluator.sibling_names().count(), 40 * domains.len());
}

#[test]
fn evaluation_never_mutates_domain() {
    let domain = toy_domain();
    let before = domain.clone();
    evaluate_fitness(&domain, &[], &settings(20, 2.0), &FitnessWeights::default()).unwrap();
    assert_eq!(domain, before);
}
