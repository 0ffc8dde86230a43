/// Domain fitness: sample names from a domain and score them on
/// normalized quality metrics.
///
/// Every metric lands in `[0, 1]`. The overall score is the weighted sum over
/// the metrics that could be computed for the run, with weights renormalized
/// over that subset. Separation needs at least one sibling domain; style
/// needs a `StyleJudge` and a non-zero style weight.
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::cancel::CancellationToken;
use crate::core::phonotactics::{normalized_range, synthesize};
use crate::core::sampling::derive_seed;
use crate::core::style::letter_count;
use crate::schema::domain::{Domain, DomainError};

/// Poll interval while waiting for a style judge to finish or be cancelled.
const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum FitnessError {
    #[error("domain '{0}' produced no usable names")]
    NoValidSamples(String),
    #[error("invalid fitness settings: {0}")]
    InvalidSettings(String),
    #[error("invalid fitness weights: {0}")]
    InvalidWeights(String),
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Sampling parameters for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessSettings {
    /// Unique names the domain is expected to supply.
    pub required_names: usize,
    /// Candidates drawn per required name.
    pub sample_factor: f64,
    pub seed: u64,
    /// Sample on the rayon pool. Results are identical either way.
    pub parallel: bool,
    pub style_timeout_ms: u64,
}

impl Default for FitnessSettings {
    fn default() -> Self {
        Self {
            required_names: 200,
            sample_factor: 2.0,
            seed: 0,
            parallel: true,
            style_timeout_ms: 2_000,
        }
    }
}

impl FitnessSettings {
    pub fn sample_count(&self) -> usize {
        ((self.required_names as f64 * self.sample_factor).ceil() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), FitnessError> {
        if self.required_names == 0 {
            return Err(FitnessError::InvalidSettings("required_names must be positive".to_string()));
        }
        if !self.sample_factor.is_finite() || self.sample_factor <= 0.0 {
            return Err(FitnessError::InvalidSettings(format!(
                "sample_factor must be positive, got {}",
                self.sample_factor
            )));
        }
        Ok(())
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, FitnessError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub capacity: f64,
    pub diffuseness: f64,
    pub separation: f64,
    pub pronounceability: f64,
    pub length: f64,
    pub style: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            capacity: 0.25,
            diffuseness: 0.2,
            separation: 0.2,
            pronounceability: 0.2,
            length: 0.15,
            style: 0.0,
        }
    }
}

impl FitnessWeights {
    pub fn validate(&self) -> Result<(), FitnessError> {
        let all = [
            self.capacity,
            self.diffuseness,
            self.separation,
            self.pronounceability,
            self.length,
            self.style,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FitnessError::InvalidWeights("weights must be finite and non-negative".to_string()));
        }
        if all.iter().all(|w| *w == 0.0) {
            return Err(FitnessError::InvalidWeights("at least one weight must be positive".to_string()));
        }
        Ok(())
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, FitnessError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

/// Per-metric values. `None` marks a metric that was not computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub capacity: f64,
    pub diffuseness: f64,
    pub separation: Option<f64>,
    pub pronounceability: f64,
    pub length: f64,
    pub style: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    pub score: f64,
    pub breakdown: FitnessBreakdown,
    /// Candidates drawn before deduplication.
    pub sampled: usize,
    /// Distinct names among the candidates.
    pub unique_names: usize,
    /// The first `required_names` distinct names, in draw order.
    pub names: Vec<String>,
}

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("style judge unavailable: {0}")]
    Unavailable(String),
}

pub type StyleFuture<'a> = Pin<Box<dyn Future<Output = Result<f64, StyleError>> + Send + 'a>>;

/// External aesthetic scorer (typically an LLM). Returns a value in `[0, 1]`.
pub trait StyleJudge: Send + Sync {
    fn score<'a>(&'a self, names: &'a [String]) -> StyleFuture<'a>;
}

type Judged = Option<Result<Result<f64, StyleError>, tokio::time::error::Elapsed>>;

/// Runs a `StyleJudge` to completion on a private runtime, bounded by a
/// timeout and abandoned on cancellation. Safe to call from inside another
/// tokio runtime: the judge is then driven from a scoped helper thread.
pub struct StyleScorer {
    judge: Arc<dyn StyleJudge>,
    runtime: Option<tokio::runtime::Runtime>,
    timeout: Duration,
}

impl StyleScorer {
    pub fn new(judge: Arc<dyn StyleJudge>, timeout: Duration) -> Result<Self, FitnessError> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            judge,
            runtime: Some(runtime),
            timeout,
        })
    }

    /// Judge a sample. Failures, out-of-range values, timeouts, and
    /// cancellation all yield `None`.
    pub fn score(&self, names: &[String], cancel: Option<&CancellationToken>) -> Option<f64> {
        let judged = if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| scope.spawn(|| self.judge_blocking(names, cancel)).join())
                .unwrap_or_else(|_| {
                    warn!("style judge thread panicked, skipping style");
                    None
                })
        } else {
            self.judge_blocking(names, cancel)
        };
        match judged {
            Some(Ok(Ok(value))) if (0.0..=1.0).contains(&value) => Some(value),
            Some(Ok(Ok(value))) => {
                warn!("style judge returned {} outside [0, 1], skipping style", value);
                None
            }
            Some(Ok(Err(e))) => {
                warn!("style judge failed, skipping style: {}", e);
                None
            }
            Some(Err(_)) => {
                warn!("style judge timed out after {:?}, skipping style", self.timeout);
                None
            }
            None => {
                debug!("style judge cancelled");
                None
            }
        }
    }

    fn judge_blocking(&self, names: &[String], cancel: Option<&CancellationToken>) -> Judged {
        let runtime = self.runtime.as_ref()?;
        runtime.block_on(async {
            let cancelled = async {
                match cancel {
                    Some(token) => {
                        while !token.is_cancelled() {
                            tokio::time::sleep(CANCEL_POLL).await;
                        }
                    }
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                result = tokio::time::timeout(self.timeout, self.judge.score(names)) => Some(result),
                _ = cancelled => None,
            }
        })
    }
}

impl Drop for StyleScorer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Draw `count` names with one derived seed per candidate, so the first `k`
/// draws are the same for any `count >= k` and the parallel path matches
/// the serial one.
pub fn sample_names(domain: &Domain, count: usize, seed: u64, parallel: bool) -> Result<Vec<String>, DomainError> {
    domain.check_inventory()?;
    let draw = |i: usize| {
        let mut rng = StdRng::seed_from_u64(derive_seed(seed, i as u64));
        synthesize(domain, &mut rng)
    };
    if parallel {
        (0..count).into_par_iter().map(draw).collect()
    } else {
        (0..count).map(draw).collect()
    }
}

type Bigrams = HashMap<(char, char), f64>;

struct SiblingSample {
    id: String,
    names: Vec<String>,
    bigrams: Bigrams,
}

/// Scores domains against a fixed set of sibling samples.
pub struct FitnessEvaluator {
    settings: FitnessSettings,
    weights: FitnessWeights,
    siblings: Vec<SiblingSample>,
    style: Option<StyleScorer>,
    cancel: Option<CancellationToken>,
}

impl FitnessEvaluator {
    /// Sibling samples are drawn once here and reused for every evaluation.
    pub fn new(siblings: &[Domain], settings: FitnessSettings, weights: FitnessWeights) -> Result<Self, FitnessError> {
        settings.validate()?;
        weights.validate()?;
        let mut samples = Vec::with_capacity(siblings.len());
        for (k, sibling) in siblings.iter().enumerate() {
            let seed = derive_seed(settings.seed, u64::MAX - k as u64);
            let names = sample_names(sibling, settings.required_names, seed, settings.parallel)?;
            let bigrams = bigram_distribution(&names);
            samples.push(SiblingSample {
                id: sibling.id.clone(),
                names,
                bigrams,
            });
        }
        Ok(Self {
            settings,
            weights,
            siblings: samples,
            style: None,
            cancel: None,
        })
    }

    pub fn with_style_judge(mut self, judge: Arc<dyn StyleJudge>) -> Result<Self, FitnessError> {
        let timeout = Duration::from_millis(self.settings.style_timeout_ms);
        self.style = Some(StyleScorer::new(judge, timeout)?);
        Ok(self)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn settings(&self) -> &FitnessSettings {
        &self.settings
    }

    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    /// Sampled names of every sibling, for corpus-level analysis.
    pub fn sibling_names(&self) -> impl Iterator<Item = &str> {
        self.siblings.iter().flat_map(|s| s.names.iter().map(String::as_str))
    }

    pub fn evaluate(&self, domain: &Domain) -> Result<FitnessReport, FitnessError> {
        let required = self.settings.required_names;
        let drawn = sample_names(domain, self.settings.sample_count(), self.settings.seed, self.settings.parallel)?;
        let sampled = drawn.len();

        let mut seen = FxHashSet::default();
        let mut unique = Vec::new();
        for name in drawn {
            if letter_count(&name) > 0 && seen.insert(name.clone()) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            return Err(FitnessError::NoValidSamples(domain.id.clone()));
        }
        let unique_names = unique.len();
        unique.truncate(required);
        let names = unique;

        let capacity = unique_names.min(required) as f64 / required as f64;
        let diffuseness = diffuseness(&names, domain.phonology.length_range);
        let separation = self.separation(domain, &names);
        let pronounceability = pronounceability(&names, domain);
        let length = length_fit(&names, domain.style.target_length, domain.style.length_tolerance);
        let style = match &self.style {
            Some(scorer) if self.weights.style > 0.0 => scorer.score(&names, self.cancel.as_ref()),
            _ => None,
        };

        let breakdown = FitnessBreakdown {
            capacity,
            diffuseness,
            separation,
            pronounceability,
            length,
            style,
        };
        let score = self.combine(&breakdown);
        debug!(
            "fitness '{}': score {:.4} ({} unique of {} sampled)",
            domain.id, score, unique_names, sampled
        );
        Ok(FitnessReport {
            score,
            breakdown,
            sampled,
            unique_names,
            names,
        })
    }

    fn separation(&self, domain: &Domain, names: &[String]) -> Option<f64> {
        let own = bigram_distribution(names);
        self.siblings
            .iter()
            .filter(|s| s.id != domain.id)
            .map(|s| jensen_shannon(&own, &s.bigrams))
            .reduce(f64::min)
    }

    /// Weighted mean over computed metrics.
    fn combine(&self, b: &FitnessBreakdown) -> f64 {
        let w = &self.weights;
        let terms = [
            (w.capacity, Some(b.capacity)),
            (w.diffuseness, Some(b.diffuseness)),
            (w.separation, b.separation),
            (w.pronounceability, Some(b.pronounceability)),
            (w.length, Some(b.length)),
            (w.style, b.style),
        ];
        let (sum, total) = terms
            .iter()
            .filter_map(|(weight, value)| value.map(|v| (*weight, v)))
            .fold((0.0, 0.0), |(sum, total), (weight, v)| (sum + weight * v, total + weight));
        if total > 0.0 {
            sum / total
        } else {
            0.0
        }
    }
}

/// One-shot evaluation without a style judge.
pub fn evaluate_fitness(
    domain: &Domain,
    siblings: &[Domain],
    settings: &FitnessSettings,
    weights: &FitnessWeights,
) -> Result<FitnessReport, FitnessError> {
    FitnessEvaluator::new(siblings, settings.clone(), weights.clone())?.evaluate(domain)
}

/// Half normalized length entropy, half mean normalized edit distance
/// between consecutive names.
pub fn diffuseness(names: &[String], length_range: (usize, usize)) -> f64 {
    if names.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for name in names {
        *counts.entry(letter_count(name)).or_default() += 1;
    }
    let (min, max) = normalized_range(length_range);
    let bins = (max - min + 1).max(counts.len());
    let entropy_term = if bins <= 1 {
        1.0
    } else {
        let n = names.len() as f64;
        let entropy: f64 = counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum();
        (entropy / (bins as f64).ln()).clamp(0.0, 1.0)
    };

    let distance_term = if names.len() < 2 {
        0.0
    } else {
        let total: f64 = names
            .windows(2)
            .map(|pair| {
                let a: Vec<char> = pair[0].to_lowercase().chars().collect();
                let b: Vec<char> = pair[1].to_lowercase().chars().collect();
                let longest = a.len().max(b.len()).max(1);
                levenshtein(&a, &b) as f64 / longest as f64
            })
            .sum();
        total / (names.len() - 1) as f64
    };

    0.5 * entropy_term + 0.5 * distance_term
}

pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            row[j + 1] = substitution.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Character bigram frequencies with `^`/`$` boundary markers.
fn bigram_distribution(names: &[String]) -> Bigrams {
    let mut counts: Bigrams = HashMap::new();
    let mut total = 0.0;
    for name in names {
        let chars: Vec<char> = std::iter::once('^')
            .chain(name.chars().filter(|c| c.is_alphabetic()).flat_map(char::to_lowercase))
            .chain(std::iter::once('$'))
            .collect();
        for pair in chars.windows(2) {
            *counts.entry((pair[0], pair[1])).or_default() += 1.0;
            total += 1.0;
        }
    }
    if total > 0.0 {
        for value in counts.values_mut() {
            *value /= total;
        }
    }
    counts
}

/// Jensen-Shannon divergence in bits, so the result lies in `[0, 1]`.
fn jensen_shannon(p: &Bigrams, q: &Bigrams) -> f64 {
    let mut divergence = 0.0;
    for key in p.keys().chain(q.keys().filter(|k| !p.contains_key(*k))) {
        let pv = p.get(key).copied().unwrap_or(0.0);
        let qv = q.get(key).copied().unwrap_or(0.0);
        let m = 0.5 * (pv + qv);
        if pv > 0.0 {
            divergence += 0.5 * pv * (pv / m).log2();
        }
        if qv > 0.0 {
            divergence += 0.5 * qv * (qv / m).log2();
        }
    }
    divergence.clamp(0.0, 1.0)
}

/// Heuristic articulation score. Penalties per name: each consonant or vowel
/// beyond a run of two, half a point per consonant junction that is neither
/// favored nor part of an inventory phoneme, two points per forbidden
/// cluster. Score is `1 - penalty / length`, floored at zero, averaged.
pub fn pronounceability(names: &[String], domain: &Domain) -> f64 {
    if names.is_empty() {
        return 0.0;
    }
    let phonology = &domain.phonology;
    let vowels: FxHashSet<char> = phonology.vowel_chars().collect();
    let approved: FxHashSet<String> = phonology
        .favored_clusters
        .iter()
        .map(|c| c.to_lowercase())
        .chain(
            phonology
                .consonants
                .iter()
                .filter(|c| c.chars().count() > 1)
                .map(|c| c.to_lowercase()),
        )
        .collect();
    let forbidden: Vec<String> = phonology
        .forbidden_clusters
        .iter()
        .map(|c| c.to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    let total: f64 = names
        .iter()
        .map(|name| {
            let letters: Vec<char> = name
                .chars()
                .filter(|c| c.is_alphabetic())
                .flat_map(char::to_lowercase)
                .collect();
            if letters.is_empty() {
                return 0.0;
            }
            let mut penalty = 0.0;
            let mut run = 0;
            let mut run_is_vowel = None;
            for (i, c) in letters.iter().enumerate() {
                let is_vowel = vowels.contains(c);
                if run_is_vowel == Some(is_vowel) {
                    run += 1;
                } else {
                    run = 1;
                    run_is_vowel = Some(is_vowel);
                }
                if run > 2 {
                    penalty += 1.0;
                }
                if i > 0 && !is_vowel && !vowels.contains(&letters[i - 1]) {
                    let junction: String = [letters[i - 1], *c].iter().collect();
                    if !approved.iter().any(|a| a.contains(&junction)) {
                        penalty += 0.5;
                    }
                }
            }
            let flat: String = letters.iter().collect();
            for cluster in &forbidden {
                penalty += 2.0 * flat.matches(cluster.as_str()).count() as f64;
            }
            (1.0 - penalty / letters.len() as f64).max(0.0)
        })
        .sum();
    total / names.len() as f64
}

/// Fraction of names within `target ± tolerance` letters.
pub fn length_fit(names: &[String], target: usize, tolerance: usize) -> f64 {
    if names.is_empty() {
        return 0.0;
    }
    let low = target.saturating_sub(tolerance);
    let high = target + tolerance;
    let hits = names
        .iter()
        .filter(|n| (low..=high).contains(&letter_count(n)))
        .count();
    hits as f64 / names.len() as f64
}
