//! Generation, evaluation, and tuning of culture names.

pub mod cancel;
pub mod context;
pub mod fitness;
pub mod grammar;
pub mod lexicon;
pub mod markov;
pub mod optimizer;
pub mod phonotactics;
pub mod pipeline;
pub mod registry;
pub mod sampling;
pub mod strategy;
pub mod style;
