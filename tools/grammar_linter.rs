/// Grammar Linter: validates culture bundles and cross-references.
///
/// Usage: grammar_linter <bundle.ron | cultures_dir> [--models-dir <dir>] [--samples <n>] [--strict]
use clap::Parser;
use env_logger::Env;
use naming_engine::core::grammar::{ExpandContext, GrammarError, Token};
use naming_engine::core::markov::{MarkovLibrary, MarkovSource};
use naming_engine::core::registry::{referenced_domains, RegistrySnapshot};
use naming_engine::schema::profile::Strategy;
use naming_engine::{CultureBundle, CultureRegistry, RegistryEdit};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "grammar_linter")]
#[command(about = "Check culture bundles for broken or suspicious references")]
struct Args {
    /// A bundle file or a directory searched recursively for `.ron` bundles
    path: PathBuf,

    /// Directory of trained Markov models referenced by `markov:` tokens
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Seeded sample expansions per grammar (0 disables)
    #[arg(long, default_value_t = 3)]
    samples: u64,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut errors = Vec::new();
    let mut edits = Vec::new();

    if args.path.is_file() {
        load_bundle(&args.path, &mut edits, &mut errors);
    } else if args.path.is_dir() {
        load_bundles_recursive(&args.path, &mut edits, &mut errors);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", args.path.display());
        process::exit(1);
    }

    let mut registry = CultureRegistry::new();
    if let Err(e) = registry.apply(edits) {
        errors.push(format!("registry rejected bundle contents: {}", e));
    }
    let snapshot = registry.snapshot();
    println!(
        "Loaded {} domain(s), {} grammar(s), {} lexeme list(s), {} profile(s)",
        snapshot.list_domains().len(),
        snapshot.list_grammars().len(),
        snapshot.list_lexemes().len(),
        snapshot.list_profiles().len()
    );

    let mut models = MarkovLibrary::new();
    if let Some(dir) = &args.models_dir {
        match models.load_dir(dir) {
            Ok(count) => {
                let mut ids: Vec<&str> = models.model_ids().collect();
                ids.sort_unstable();
                println!("Loaded {} markov model(s): {}", count, ids.join(", "));
            }
            Err(e) => errors.push(format!("failed to load models from '{}': {}", dir.display(), e)),
        }
    }
    let markov: Option<&dyn MarkovSource> = args.models_dir.as_ref().map(|_| &models as &dyn MarkovSource);

    let mut warnings = snapshot.lint(markov);
    warnings.extend(unused_domains(&snapshot));
    if args.models_dir.is_some() {
        warnings.extend(unused_models(&snapshot, &models));
    }
    let (sample_errors, sample_warnings) = sample_expansions(&snapshot, markov, args.samples);
    errors.extend(sample_errors);
    warnings.extend(sample_warnings);

    println!("\n=== Grammar Lint Report ===\n");
    for grammar in snapshot.list_grammars() {
        let domains = referenced_domains(grammar);
        println!(
            "  {} (start '{}', {} rule(s)) domains: {}",
            grammar.id,
            grammar.start,
            grammar.rules.len(),
            if domains.is_empty() {
                "-".to_string()
            } else {
                domains.join(", ")
            }
        );
    }
    println!();

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }
    for warning in &warnings {
        println!("WARNING: {}", warning);
    }
    for error in &errors {
        println!("ERROR: {}", error);
    }
    println!("\nSummary: {} errors, {} warnings", errors.len(), warnings.len());

    if errors.is_empty() && !(args.strict && !warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_bundle(path: &Path, edits: &mut Vec<RegistryEdit>, errors: &mut Vec<String>) {
    match CultureBundle::load_from_ron(path).and_then(CultureBundle::into_edits) {
        Ok(bundle_edits) => {
            println!("  Loaded: {}", path.display());
            edits.extend(bundle_edits);
        }
        Err(e) => errors.push(format!("{}: {}", path.display(), e)),
    }
}

fn load_bundles_recursive(dir: &Path, edits: &mut Vec<RegistryEdit>, errors: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        errors.push(format!("cannot read directory '{}'", dir.display()));
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            load_bundles_recursive(&path, edits, errors);
        } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            load_bundle(&path, edits, errors);
        }
    }
}

/// Domains no grammar token or profile strategy can reach.
fn unused_domains(snapshot: &naming_engine::core::registry::RegistrySnapshot) -> Vec<String> {
    let mut used: BTreeSet<&str> = BTreeSet::new();
    for grammar in snapshot.list_grammars() {
        used.extend(referenced_domains(grammar));
    }
    for profile in snapshot.list_profiles() {
        for group in &profile.strategy_groups {
            for weighted in &group.strategies {
                if let Strategy::Phonotactic { domain_id } = &weighted.strategy {
                    used.insert(domain_id);
                }
            }
        }
    }
    snapshot
        .list_domains()
        .into_iter()
        .filter(|d| !used.contains(d.id.as_str()))
        .map(|d| format!("domain '{}' is not used by any grammar or profile", d.id))
        .collect()
}

/// Loaded models no `markov:` token refers to.
fn unused_models(snapshot: &RegistrySnapshot, models: &MarkovLibrary) -> Vec<String> {
    let used: BTreeSet<&str> = snapshot
        .list_grammars()
        .into_iter()
        .flat_map(|g| g.rules.values().flatten())
        .flat_map(|p| &p.tokens)
        .filter_map(|t| match t {
            Token::Markov(id) => Some(id.as_str()),
            _ => None,
        })
        .collect();
    let mut ids: Vec<&str> = models.model_ids().filter(|id| !used.contains(id)).collect();
    ids.sort_unstable();
    ids.into_iter()
        .map(|id| format!("markov model '{}' is not used by any grammar", id))
        .collect()
}

/// Expand every grammar with fixed seeds, scoped to its first culture.
///
/// Configuration failures become errors; data gaps such as an empty slot for
/// that scope become warnings. Each grammar reports at most one failure.
fn sample_expansions(
    snapshot: &RegistrySnapshot,
    markov: Option<&dyn MarkovSource>,
    samples: u64,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for grammar in snapshot.list_grammars() {
        let culture = grammar.applies_to.cultures.first().map(String::as_str);
        let mut ctx = ExpandContext::new(snapshot, snapshot).for_scope(culture, None);
        if let Some(markov) = markov {
            ctx = ctx.with_markov(markov);
        }
        for seed in 0..samples {
            let mut rng = StdRng::seed_from_u64(seed);
            match grammar.expand_start(&ctx, &mut rng) {
                Ok(_) => {}
                // already reported by lint
                Err(GrammarError::NoMarkovSource(_)) => break,
                Err(e) => {
                    let message = format!("grammar '{}' (seed {}): {}", grammar.id, seed, e);
                    if e.is_configuration() {
                        errors.push(message);
                    } else {
                        warnings.push(message);
                    }
                    break;
                }
            }
        }
    }
    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use naming_engine::core::grammar::Grammar;
    use naming_engine::core::markov::MarkovTrainer;

    fn registry_with(grammar: Grammar) -> CultureRegistry {
        let mut registry = CultureRegistry::new();
        registry.apply(vec![RegistryEdit::UpsertGrammar(grammar)]).unwrap();
        registry
    }

    #[test]
    fn missing_domain_is_a_sample_error() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["domain:nowhere"])]).unwrap();
        let snapshot = registry_with(grammar).snapshot();
        let (errors, warnings) = sample_expansions(&snapshot, None, 3);
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("nowhere"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn empty_slot_is_a_sample_warning() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["slot:titles"])]).unwrap();
        let snapshot = registry_with(grammar).snapshot();
        let (errors, warnings) = sample_expansions(&snapshot, None, 3);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn missing_markov_source_is_left_to_lint() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["markov:clans"])]).unwrap();
        let snapshot = registry_with(grammar).snapshot();
        let (errors, warnings) = sample_expansions(&snapshot, None, 3);
        assert!(errors.is_empty() && warnings.is_empty());
    }

    #[test]
    fn loaded_but_unreferenced_models_are_flagged() {
        let grammar = Grammar::from_rules("g", "name", &[("name", &["markov:clans Hold"])]).unwrap();
        let snapshot = registry_with(grammar).snapshot();
        let mut models = MarkovLibrary::new();
        models.insert("clans", MarkovTrainer::train("Dun\nBorin\n", 3));
        models.insert("rivers", MarkovTrainer::train("Anduin\nIsen\n", 3));
        let warnings = unused_models(&snapshot, &models);
        assert_eq!(warnings, vec!["markov model 'rivers' is not used by any grammar".to_string()]);
    }
}
