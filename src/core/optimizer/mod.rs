/// Domain optimizer: metaheuristic search over Domain parameters that
/// maximizes weighted fitness.
///
/// Every algorithm starts from the original domain's fitness as best-so-far
/// and only replaces it on strict improvement, so the returned fitness never
/// falls below the initial one. All candidates are scored with the same
/// sampling seed. The original domain is never mutated.
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::core::cancel::CancellationToken;
use crate::core::fitness::{
    FitnessBreakdown, FitnessError, FitnessEvaluator, FitnessReport, FitnessSettings, FitnessWeights, StyleJudge,
};
use crate::schema::domain::{Domain, DomainError};
use params::{ParamSpace, ParamVector};

pub mod anneal;
pub mod cluster;
pub mod genetic;
pub mod hillclimb;
pub mod params;
pub mod tpe;

#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("fitness error: {0}")]
    Fitness(#[from] FitnessError),
    #[error("domain '{0}': no valid candidate could be produced")]
    NoValidCandidate(String),
    #[error("invalid algorithm config: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Hillclimb,
    SimAnneal,
    Ga,
    Bayes,
    Cluster,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Hillclimb,
        Algorithm::SimAnneal,
        Algorithm::Ga,
        Algorithm::Bayes,
        Algorithm::Cluster,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hillclimb => "hillclimb",
            Self::SimAnneal => "sim_anneal",
            Self::Ga => "ga",
            Self::Bayes => "bayes",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown algorithm '{}'", s))
    }
}

/// Parent selection for the genetic algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Tournament,
    Roulette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub algorithm: Algorithm,
    /// Iterations (generations for `ga`).
    pub iterations: usize,
    /// Step size as a fraction of each parameter's range.
    pub perturbation_scale: f64,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub population_size: usize,
    pub mutation_rate: f64,
    pub tournament_size: usize,
    pub selection: Selection,
    pub elitism: usize,
    /// Fraction of history treated as "good" by TPE.
    pub tpe_gamma: f64,
    /// Candidates drawn from the good density per TPE iteration.
    pub tpe_candidates: usize,
    /// Uniform random trials before TPE modelling starts.
    pub tpe_warmup: usize,
    pub cluster_min_frequency: f64,
    pub cluster_max_additions: usize,
    pub seed: u64,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Hillclimb,
            iterations: 100,
            perturbation_scale: 0.15,
            initial_temperature: 0.05,
            cooling_rate: 0.95,
            population_size: 12,
            mutation_rate: 0.2,
            tournament_size: 3,
            selection: Selection::Tournament,
            elitism: 2,
            tpe_gamma: 0.25,
            tpe_candidates: 24,
            tpe_warmup: 8,
            cluster_min_frequency: 0.02,
            cluster_max_additions: 3,
            seed: 0,
        }
    }
}

impl AlgorithmConfig {
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), OptimizationError> {
        let invalid = |msg: &str| Err(OptimizationError::InvalidConfig(msg.to_string()));
        if !(self.perturbation_scale.is_finite() && self.perturbation_scale > 0.0) {
            return invalid("perturbation_scale must be positive");
        }
        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            return invalid("initial_temperature must be positive");
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            return invalid("cooling_rate must be in (0, 1]");
        }
        if self.population_size < 2 {
            return invalid("population_size must be at least 2");
        }
        if self.elitism >= self.population_size {
            return invalid("elitism must be smaller than population_size");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid("mutation_rate must be in [0, 1]");
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size must be positive");
        }
        if !(self.tpe_gamma > 0.0 && self.tpe_gamma < 1.0) {
            return invalid("tpe_gamma must be in (0, 1)");
        }
        if self.tpe_candidates == 0 {
            return invalid("tpe_candidates must be positive");
        }
        Ok(())
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, OptimizationError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub domain_id: String,
    pub algorithm: Algorithm,
    pub initial_fitness: f64,
    pub final_fitness: f64,
    pub improvement: f64,
    pub initial_config: Domain,
    pub optimized_config: Domain,
    pub final_breakdown: FitnessBreakdown,
    pub iterations_run: usize,
    pub evaluations: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationProgress {
    pub algorithm: Algorithm,
    pub iteration: usize,
    pub total: usize,
    pub current_fitness: f64,
    pub best_fitness: f64,
}

pub type ProgressCallback<'a> = &'a mut dyn FnMut(&OptimizationProgress);

/// Per-run state shared by every algorithm: scoring, best-so-far, progress,
/// and cancellation.
pub(crate) struct Search<'a, 'p> {
    pub evaluator: &'a FitnessEvaluator,
    pub config: &'a AlgorithmConfig,
    pub base: &'a Domain,
    pub space: ParamSpace,
    pub rng: StdRng,
    pub initial_params: ParamVector,
    pub initial_score: f64,
    pub best_domain: Domain,
    pub best_report: FitnessReport,
    pub iterations_run: usize,
    pub evaluations: usize,
    valid_evaluations: usize,
    cancel: Option<&'a CancellationToken>,
    progress: Option<ProgressCallback<'p>>,
}

impl Search<'_, '_> {
    pub fn best_score(&self) -> f64 {
        self.best_report.score
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.is_cancelled())
    }

    /// Score a parameter vector, tracking the best valid domain seen.
    pub fn score_params(&mut self, params: &[f64]) -> Option<f64> {
        let candidate = self.space.decode(self.base, params);
        self.score_domain(candidate)
    }

    /// Score a candidate domain, keeping it as best on strict improvement.
    /// Invalid candidates score `None`.
    pub fn score_domain(&mut self, candidate: Domain) -> Option<f64> {
        let report = self.evaluate_candidate(&candidate)?;
        let score = report.score;
        if score > self.best_report.score {
            self.keep_best(candidate, report);
        }
        Some(score)
    }

    /// Validate and evaluate without touching the best-so-far.
    pub fn evaluate_candidate(&mut self, candidate: &Domain) -> Option<FitnessReport> {
        self.evaluations += 1;
        if let Err(e) = candidate.validate() {
            debug!("optimizer '{}': rejected candidate: {}", self.base.id, e);
            return None;
        }
        match self.evaluator.evaluate(candidate) {
            Ok(report) => {
                self.valid_evaluations += 1;
                Some(report)
            }
            Err(e) => {
                debug!("optimizer '{}': candidate failed to evaluate: {}", self.base.id, e);
                None
            }
        }
    }

    /// Replace the best-so-far domain and its report together.
    pub fn keep_best(&mut self, domain: Domain, report: FitnessReport) {
        debug!(
            "optimizer '{}': best {:.4} -> {:.4}",
            self.base.id, self.best_report.score, report.score
        );
        self.best_domain = domain;
        self.best_report = report;
    }

    /// Record a finished iteration and notify the progress callback.
    pub fn report(&mut self, current_fitness: f64, total: usize) {
        self.iterations_run += 1;
        let progress = OptimizationProgress {
            algorithm: self.config.algorithm,
            iteration: self.iterations_run,
            total,
            current_fitness,
            best_fitness: self.best_report.score,
        };
        if let Some(callback) = self.progress.as_mut() {
            callback(&progress);
        }
    }
}

/// Optimizer bound to one sibling snapshot and one set of settings.
pub struct DomainOptimizer {
    evaluator: FitnessEvaluator,
    config: AlgorithmConfig,
    cancel: Option<CancellationToken>,
}

impl DomainOptimizer {
    pub fn new(
        siblings: &[Domain],
        settings: FitnessSettings,
        weights: FitnessWeights,
        config: AlgorithmConfig,
    ) -> Result<Self, OptimizationError> {
        config.validate()?;
        let evaluator = FitnessEvaluator::new(siblings, settings, weights)?;
        Ok(Self {
            evaluator,
            config,
            cancel: None,
        })
    }

    pub fn with_style_judge(mut self, judge: Arc<dyn StyleJudge>) -> Result<Self, OptimizationError> {
        self.evaluator = self.evaluator.with_style_judge(judge)?;
        Ok(self)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.evaluator = self.evaluator.with_cancellation(token.clone());
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    pub fn optimize(
        &self,
        domain: &Domain,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<OptimizationResult, OptimizationError> {
        domain.validate()?;
        let initial_report = self.evaluator.evaluate(domain)?;
        let initial_fitness = initial_report.score;
        let space = ParamSpace::for_domain(domain);
        let initial_params = space.encode(domain);
        info!(
            "optimizer '{}': {} starting at {:.4}",
            domain.id, self.config.algorithm, initial_fitness
        );

        let mut search = Search {
            evaluator: &self.evaluator,
            config: &self.config,
            base: domain,
            space,
            rng: StdRng::seed_from_u64(self.config.seed),
            initial_params,
            initial_score: initial_fitness,
            best_domain: domain.clone(),
            best_report: initial_report,
            iterations_run: 0,
            evaluations: 0,
            valid_evaluations: 0,
            cancel: self.cancel.as_ref(),
            progress: on_progress,
        };

        match self.config.algorithm {
            Algorithm::Hillclimb => hillclimb::run(&mut search),
            Algorithm::SimAnneal => anneal::run(&mut search),
            Algorithm::Ga => genetic::run(&mut search),
            Algorithm::Bayes => tpe::run(&mut search),
            Algorithm::Cluster => cluster::run(&mut search),
        }

        if search.evaluations > 0 && search.valid_evaluations == 0 {
            return Err(OptimizationError::NoValidCandidate(domain.id.clone()));
        }

        let cancelled = search.cancelled();
        let final_fitness = search.best_report.score;
        info!(
            "optimizer '{}': {} finished at {:.4} ({:+.4}) after {} iteration(s){}",
            domain.id,
            self.config.algorithm,
            final_fitness,
            final_fitness - initial_fitness,
            search.iterations_run,
            if cancelled { ", cancelled" } else { "" }
        );
        Ok(OptimizationResult {
            domain_id: domain.id.clone(),
            algorithm: self.config.algorithm,
            initial_fitness,
            final_fitness,
            improvement: final_fitness - initial_fitness,
            initial_config: domain.clone(),
            optimized_config: search.best_domain,
            final_breakdown: search.best_report.breakdown,
            iterations_run: search.iterations_run,
            evaluations: search.evaluations,
            cancelled,
        })
    }
}

/// Optimize one domain against a sibling snapshot.
pub fn optimize(
    domain: &Domain,
    settings: &FitnessSettings,
    weights: &FitnessWeights,
    config: &AlgorithmConfig,
    siblings: &[Domain],
    on_progress: Option<ProgressCallback<'_>>,
) -> Result<OptimizationResult, OptimizationError> {
    DomainOptimizer::new(siblings, settings.clone(), weights.clone(), config.clone())?.optimize(domain, on_progress)
}

/// Optimize each domain against the others as siblings. Siblings that
/// cannot synthesize are left out of the snapshot. A failure aborts only
/// that domain's run.
pub fn optimize_batch(
    domains: &[Domain],
    settings: &FitnessSettings,
    weights: &FitnessWeights,
    config: &AlgorithmConfig,
    cancel: Option<&CancellationToken>,
) -> Vec<(String, Result<OptimizationResult, OptimizationError>)> {
    let mut results = Vec::with_capacity(domains.len());
    for (i, domain) in domains.iter().enumerate() {
        let siblings: Vec<Domain> = domains
            .iter()
            .enumerate()
            .filter(|(j, d)| *j != i && d.check_inventory().is_ok())
            .map(|(_, d)| d.clone())
            .collect();
        let result = DomainOptimizer::new(&siblings, settings.clone(), weights.clone(), config.clone()).and_then(
            |optimizer| {
                let optimizer = match cancel {
                    Some(token) => optimizer.with_cancellation(token.clone()),
                    None => optimizer,
                };
                optimizer.optimize(domain, None)
            },
        );
        if let Err(e) = &result {
            info!("optimizer: batch entry '{}' failed: {}", domain.id, e);
        }
        results.push((domain.id.clone(), result));
    }
    results
}
