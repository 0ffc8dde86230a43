/// Name Preview: sample names from a domain or for an entity description.
///
/// Usage:
///   name_preview <cultures_dir> --domain <id> [--count n] [--seed s] [--verbose]
///   name_preview <cultures_dir> --kind npc --culture elven [--tags a,b] [--prominence mythic]
use clap::Parser;
use env_logger::Env;
use naming_engine::core::phonotactics::synthesize_detailed;
use naming_engine::core::sampling::derive_seed;
use naming_engine::{Entity, NamingEngine, Prominence};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "name_preview")]
#[command(about = "Preview generated names from culture bundles")]
struct Args {
    /// Directory of culture bundle `.ron` files
    cultures_dir: PathBuf,

    /// Sample a single domain directly instead of routing an entity
    #[arg(short, long)]
    domain: Option<String>,

    /// Entity kind (e.g. npc, location, faction)
    #[arg(short, long, default_value = "npc")]
    kind: String,

    #[arg(short, long)]
    culture: Option<String>,

    #[arg(long)]
    subtype: Option<String>,

    /// Comma-separated entity tags
    #[arg(short, long, value_delimiter = ',')]
    tags: Vec<String>,

    /// forgotten, marginal, recognized, renowned, or mythic
    #[arg(long, value_parser = parse_prominence)]
    prominence: Option<Prominence>,

    /// Use this profile regardless of culture
    #[arg(long)]
    profile: Option<String>,

    /// Profile used when nothing else applies
    #[arg(long)]
    default_profile: Option<String>,

    /// Directory of trained Markov models
    #[arg(long)]
    models_dir: Option<PathBuf>,

    #[arg(short = 'n', long, default_value = "10")]
    count: usize,

    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Show relaxed constraints for domain samples
    #[arg(short, long)]
    verbose: bool,
}

fn parse_prominence(value: &str) -> Result<Prominence, String> {
    match value {
        "forgotten" => Ok(Prominence::Forgotten),
        "marginal" => Ok(Prominence::Marginal),
        "recognized" => Ok(Prominence::Recognized),
        "renowned" => Ok(Prominence::Renowned),
        "mythic" => Ok(Prominence::Mythic),
        other => Err(format!("unknown prominence '{}'", other)),
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut builder = NamingEngine::builder()
        .seed(args.seed)
        .cultures_dir(&args.cultures_dir);
    if let Some(dir) = &args.models_dir {
        builder = builder.markov_models_dir(dir);
    }
    if let Some(id) = &args.default_profile {
        builder = builder.default_profile(id);
    }
    let mut engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error loading cultures: {}", e);
        process::exit(1);
    });

    if let Some(domain_id) = &args.domain {
        preview_domain(&engine, domain_id, &args);
        return;
    }

    let mut entity = Entity::new(1, &args.kind);
    if let Some(culture) = &args.culture {
        entity = entity.with_culture(culture);
    }
    if let Some(subtype) = &args.subtype {
        entity = entity.with_subtype(subtype);
    }
    if let Some(prominence) = args.prominence {
        entity = entity.with_prominence(prominence);
    }
    let tags: Vec<&str> = args.tags.iter().map(String::as_str).collect();
    entity = entity.with_tags(&tags);
    entity.profile_id = args.profile.clone();

    println!("=== Names for {} ({}) ===\n", args.kind, args.culture.as_deref().unwrap_or("any culture"));
    match engine.generate_batch(&entity, args.count, None) {
        Ok(names) => {
            for name in &names {
                println!("  {}", name);
            }
            if names.len() < args.count {
                println!("\n  (only {} distinct names available)", names.len());
            }
        }
        Err(e) => {
            eprintln!("Error generating names: {}", e);
            process::exit(1);
        }
    }
}

fn preview_domain(engine: &NamingEngine, domain_id: &str, args: &Args) {
    let snapshot = engine.registry().snapshot();
    let Some(domain) = snapshot.domain(domain_id) else {
        eprintln!("Error: domain '{}' not found", domain_id);
        process::exit(1);
    };

    println!("=== Domain '{}' ({}) ===\n", domain.id, domain.culture_id);
    for i in 0..args.count {
        let mut rng = StdRng::seed_from_u64(derive_seed(args.seed, i as u64));
        match synthesize_detailed(domain, &mut rng) {
            Ok(s) if args.verbose => {
                let mut notes = Vec::new();
                if s.length_adjusted {
                    notes.push("length adjusted".to_string());
                }
                if s.relaxed_clusters > 0 {
                    notes.push(format!("{} relaxed cluster(s)", s.relaxed_clusters));
                }
                if s.affixes_dropped {
                    notes.push("affixes dropped".to_string());
                }
                if notes.is_empty() {
                    println!("  {}", s.name);
                } else {
                    println!("  {:<16} [{}]", s.name, notes.join(", "));
                }
            }
            Ok(s) => println!("  {}", s.name),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}
