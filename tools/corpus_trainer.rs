/// Corpus Trainer: trains a name Markov model from a word list.
///
/// Usage: corpus_trainer --input <names.txt> --output <model.ron> [--ngram <2-5>] [--preview <n>]
use clap::Parser;
use env_logger::Env;
use naming_engine::core::markov::{save_model, MarkovTrainer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "corpus_trainer")]
#[command(about = "Train a character n-gram name model from a word list")]
struct Args {
    /// Text file with one or more names per line (`#` starts a comment)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the trained model (RON)
    #[arg(short, long)]
    output: PathBuf,

    /// N-gram order
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u64).range(2..=5))]
    ngram: u64,

    /// Print this many sample names after training
    #[arg(long, default_value = "0")]
    preview: usize,

    /// Inclusive length window for preview names
    #[arg(long, default_value = "3")]
    min_len: usize,

    #[arg(long, default_value = "10")]
    max_len: usize,

    #[arg(short, long, default_value = "0")]
    seed: u64,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.input).unwrap_or_else(|e| {
        eprintln!("Error reading input file '{}': {}", args.input.display(), e);
        process::exit(1);
    });

    println!("Training {}-gram model from '{}'...", args.ngram, args.input.display());
    let model = MarkovTrainer::train(&text, args.ngram as usize);

    let transition_count: usize = model.transitions.values().map(|v| v.len()).sum();
    println!(
        "Model trained: {} names, {} unique prefixes, {} transitions",
        model.corpus.len(),
        model.transitions.len(),
        transition_count
    );

    if args.preview > 0 {
        let mut rng = StdRng::seed_from_u64(args.seed);
        println!("\nSample names:");
        for _ in 0..args.preview {
            match model.generate(&mut rng, args.min_len, args.max_len) {
                Ok(name) => println!("  {}", name),
                Err(e) => {
                    eprintln!("  (generation failed: {})", e);
                    break;
                }
            }
        }
        println!();
    }

    save_model(&model, &args.output).unwrap_or_else(|e| {
        eprintln!("Error saving model to '{}': {}", args.output.display(), e);
        process::exit(1);
    });

    println!("Model saved to '{}'", args.output.display());
}
