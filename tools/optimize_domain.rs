/// Optimize Domain: tune a domain's weights and style against fitness.
///
/// Usage:
///   optimize_domain <cultures_dir> --domain <id> [--algorithm hillclimb] [--output tuned.ron]
///   optimize_domain <cultures_dir> --all [--algorithm ga]
use clap::Parser;
use env_logger::Env;
use naming_engine::core::fitness::{FitnessSettings, FitnessWeights};
use naming_engine::core::optimizer::{
    optimize_batch, Algorithm, AlgorithmConfig, DomainOptimizer, OptimizationProgress, OptimizationResult,
};
use naming_engine::schema::domain::Domain;
use naming_engine::CultureRegistry;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "optimize_domain")]
#[command(about = "Run a metaheuristic optimizer over culture domains")]
struct Args {
    /// Directory of culture bundle `.ron` files
    cultures_dir: PathBuf,

    /// Domain to optimize; the rest of the directory serves as siblings
    #[arg(short, long, conflicts_with = "all")]
    domain: Option<String>,

    /// Optimize every domain, each against the others
    #[arg(long)]
    all: bool,

    /// hillclimb, sim_anneal, ga, bayes, or cluster
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// AlgorithmConfig RON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// FitnessSettings RON file
    #[arg(long)]
    fitness: Option<PathBuf>,

    /// FitnessWeights RON file
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Override the configured iteration count
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Override the configured seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the optimized domain (or, with --all, one file per domain into this directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut registry = CultureRegistry::new();
    registry.load_from_ron_dir(&args.cultures_dir).unwrap_or_else(|e| {
        eprintln!("Error loading cultures from '{}': {}", args.cultures_dir.display(), e);
        process::exit(1);
    });
    let snapshot = registry.snapshot();

    let settings = match &args.fitness {
        Some(path) => FitnessSettings::load_from_ron(path).unwrap_or_else(|e| exit_with("fitness settings", path, e)),
        None => FitnessSettings::default(),
    };
    let weights = match &args.weights {
        Some(path) => FitnessWeights::load_from_ron(path).unwrap_or_else(|e| exit_with("fitness weights", path, e)),
        None => FitnessWeights::default(),
    };
    let mut config = match &args.config {
        Some(path) => AlgorithmConfig::load_from_ron(path).unwrap_or_else(|e| exit_with("algorithm config", path, e)),
        None => AlgorithmConfig::default(),
    };
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if args.all {
        let domains: Vec<Domain> = snapshot.list_domains().into_iter().cloned().collect();
        let mut failures = 0;
        for (id, result) in optimize_batch(&domains, &settings, &weights, &config, None) {
            match result {
                Ok(result) => {
                    print_result(&result);
                    if let Some(dir) = &args.output {
                        save_domain(&result.optimized_config, &dir.join(format!("{}.ron", id)));
                    }
                }
                Err(e) => {
                    failures += 1;
                    eprintln!("'{}' failed: {}", id, e);
                }
            }
        }
        process::exit(if failures == 0 { 0 } else { 1 });
    }

    let Some(domain_id) = &args.domain else {
        eprintln!("Error: pass --domain <id> or --all");
        process::exit(1);
    };
    let Some(domain) = snapshot.domain(domain_id) else {
        eprintln!("Error: domain '{}' not found", domain_id);
        process::exit(1);
    };
    let siblings: Vec<Domain> = snapshot.siblings_of(domain_id).into_iter().cloned().collect();

    let optimizer = DomainOptimizer::new(&siblings, settings, weights, config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    let mut on_progress = |p: &OptimizationProgress| {
        if p.iteration % 10 == 0 || p.iteration == p.total {
            println!(
                "  [{}] {}/{} current {:.4} best {:.4}",
                p.algorithm, p.iteration, p.total, p.current_fitness, p.best_fitness
            );
        }
    };
    let result = optimizer.optimize(domain, Some(&mut on_progress)).unwrap_or_else(|e| {
        eprintln!("Optimization failed: {}", e);
        process::exit(1);
    });

    print_result(&result);
    if let Some(path) = &args.output {
        save_domain(&result.optimized_config, path);
    }
}

fn print_result(result: &OptimizationResult) {
    let b = &result.final_breakdown;
    println!("\n=== {} via {} ===", result.domain_id, result.algorithm);
    println!(
        "  fitness {:.4} -> {:.4} ({:+.4}) in {} iteration(s), {} evaluation(s){}",
        result.initial_fitness,
        result.final_fitness,
        result.improvement,
        result.iterations_run,
        result.evaluations,
        if result.cancelled { ", cancelled" } else { "" }
    );
    println!(
        "  capacity {:.3}  diffuseness {:.3}  separation {}  pronounceability {:.3}  length {:.3}",
        b.capacity,
        b.diffuseness,
        b.separation.map_or("-".to_string(), |s| format!("{:.3}", s)),
        b.pronounceability,
        b.length
    );
}

fn save_domain(domain: &Domain, path: &Path) {
    let serialized = ron::ser::to_string_pretty(domain, ron::ser::PrettyConfig::default()).unwrap_or_else(|e| {
        eprintln!("Error serializing '{}': {}", domain.id, e);
        process::exit(1);
    });
    std::fs::write(path, serialized).unwrap_or_else(|e| {
        eprintln!("Error writing '{}': {}", path.display(), e);
        process::exit(1);
    });
    println!("  saved to '{}'", path.display());
}

fn exit_with(what: &str, path: &Path, error: impl std::fmt::Display) -> ! {
    eprintln!("Error loading {} from '{}': {}", what, path.display(), error);
    process::exit(1);
}
