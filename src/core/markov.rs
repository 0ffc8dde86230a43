/// Character-level Markov name model: training, serialization, and generation.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::core::style::capitalize;
use crate::schema::domain::Capitalization;

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("no data for generation (model is empty)")]
    NoData,
    #[error("unknown markov model '{0}'")]
    UnknownModel(String),
    #[error("no acceptable name after {0} attempts")]
    Exhausted(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonSer(#[from] ron::Error),
}

/// Special character marking name start.
const NAME_START: char = '^';
/// Special character marking name end.
const NAME_END: char = '$';
/// Walks attempted before giving up on a length window.
const MAX_ATTEMPTS: usize = 64;

/// A trained model storing character n-gram transition counts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NameMarkovModel {
    /// N-gram order (2 = each char conditioned on the previous one).
    pub n: usize,
    /// Transition table: prefix of `n - 1` chars → [(next_char, count)].
    pub transitions: HashMap<String, Vec<(char, u32)>>,
    /// Training names, lowercased; generation avoids echoing them.
    #[serde(default)]
    pub corpus: FxHashSet<String>,
}

impl NameMarkovModel {
    /// Generate a lowercase name whose length lies in `[min_len, max_len]`.
    ///
    /// Names that reproduce a training entry are rejected unless every
    /// attempt does so, in which case the last such walk is returned.
    pub fn generate(&self, rng: &mut StdRng, min_len: usize, max_len: usize) -> Result<String, MarkovError> {
        if self.transitions.is_empty() || self.n < 2 {
            return Err(MarkovError::NoData);
        }

        let mut echo = None;
        for _ in 0..MAX_ATTEMPTS {
            let Some(name) = self.walk(rng, max_len) else {
                continue;
            };
            let len = name.chars().count();
            if len < min_len || len > max_len {
                continue;
            }
            if self.corpus.contains(&name) {
                echo = Some(name);
                continue;
            }
            return Ok(name);
        }
        echo.ok_or(MarkovError::Exhausted(MAX_ATTEMPTS))
    }

    fn walk(&self, rng: &mut StdRng, max_len: usize) -> Option<String> {
        let mut state: Vec<char> = vec![NAME_START; self.n - 1];
        let mut out = String::new();
        for _ in 0..=max_len {
            let key: String = state.iter().collect();
            let next = pick_next(&self.transitions, &key, rng)?;
            if next == NAME_END {
                return Some(out);
            }
            out.push(next);
            state.remove(0);
            state.push(next);
        }
        None
    }
}

/// Pick the next char from transitions given a state prefix.
fn pick_next(transitions: &HashMap<String, Vec<(char, u32)>>, state: &str, rng: &mut StdRng) -> Option<char> {
    let options = transitions.get(state)?;
    if options.is_empty() {
        return None;
    }
    let weights: Vec<u32> = options.iter().map(|(_, count)| *count).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(options[dist.sample(rng)].0)
}

/// Trains name models from raw word lists.
pub struct MarkovTrainer;

impl MarkovTrainer {
    /// Train a model from text holding one or more names per line.
    ///
    /// Names are split on whitespace and commas; lines starting with `#`
    /// are comments. Only letters, apostrophes, and hyphens are kept.
    pub fn train(text: &str, n: usize) -> NameMarkovModel {
        assert!((2..=5).contains(&n), "n-gram order must be 2-5");

        let mut transitions: HashMap<String, Vec<(char, u32)>> = HashMap::new();
        let mut corpus = FxHashSet::default();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            for raw in trimmed.split(|c: char| c.is_whitespace() || c == ',') {
                let name: String = raw
                    .chars()
                    .filter(|c| c.is_alphabetic() || *c == '\'' || *c == '-')
                    .flat_map(char::to_lowercase)
                    .collect();
                if name.is_empty() {
                    continue;
                }

                let mut padded: Vec<char> = vec![NAME_START; n - 1];
                padded.extend(name.chars());
                padded.push(NAME_END);
                for window in padded.windows(n) {
                    let prefix: String = window[..n - 1].iter().collect();
                    add_transition(&mut transitions, prefix, window[n - 1]);
                }
                corpus.insert(name);
            }
        }

        NameMarkovModel {
            n,
            transitions,
            corpus,
        }
    }
}

/// Add a transition to a transition table, incrementing the count.
fn add_transition(table: &mut HashMap<String, Vec<(char, u32)>>, prefix: String, next: char) {
    let entries = table.entry(prefix).or_default();
    if let Some(entry) = entries.iter_mut().find(|(c, _)| *c == next) {
        entry.1 += 1;
    } else {
        entries.push((next, 1));
    }
}

/// External language model behind `markov:<modelId>` grammar tokens.
pub trait MarkovSource {
    fn generate(&self, model_id: &str, rng: &mut StdRng) -> Result<String, MarkovError>;

    fn has_model(&self, model_id: &str) -> bool;
}

/// A set of named models sharing one length window and casing.
#[derive(Debug, Clone)]
pub struct MarkovLibrary {
    models: HashMap<String, NameMarkovModel>,
    pub length_range: (usize, usize),
    pub capitalization: Capitalization,
}

impl Default for MarkovLibrary {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
            length_range: (3, 10),
            capitalization: Capitalization::Title,
        }
    }
}

impl MarkovLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, model: NameMarkovModel) {
        self.models.insert(id.to_string(), model);
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Load every `.ron` model in a directory, keyed by file stem.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, MarkovError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("ron") {
                continue;
            }
            let model = load_model(&path)?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            self.models.insert(name, model);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl MarkovSource for MarkovLibrary {
    fn generate(&self, model_id: &str, rng: &mut StdRng) -> Result<String, MarkovError> {
        let model = self
            .models
            .get(model_id)
            .ok_or_else(|| MarkovError::UnknownModel(model_id.to_string()))?;
        let (min, max) = self.length_range;
        let raw = model.generate(rng, min, max)?;
        Ok(capitalize(&raw, self.capitalization))
    }

    fn has_model(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }
}

/// Save a model to a RON file.
pub fn save_model(model: &NameMarkovModel, path: &Path) -> Result<(), MarkovError> {
    let serialized = ron::ser::to_string_pretty(model, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a model from a RON file.
pub fn load_model(path: &Path) -> Result<NameMarkovModel, MarkovError> {
    let contents = std::fs::read_to_string(path)?;
    let model: NameMarkovModel = ron::from_str(&contents)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const CORPUS: &str = "# elven names\n\
        Aelindra, Caladrel, Elenwe\n\
        Galadon Ithilien Lorindel\n\
        Melian Nimrodel Silmarien Thalanor\n";

    fn train_test_corpus() -> NameMarkovModel {
        MarkovTrainer::train(CORPUS, 3)
    }

    #[test]
    fn train_creates_transitions() {
        let model = train_test_corpus();
        assert_eq!(model.n, 3);
        assert!(!model.transitions.is_empty());
        assert!(model.transitions.contains_key("^^"));
        assert_eq!(model.corpus.len(), 10);
        assert!(model.corpus.contains("aelindra"));
    }

    #[test]
    fn comments_are_skipped() {
        let model = MarkovTrainer::train("# zzz\nab", 2);
        assert!(!model.corpus.contains("zzz"));
        assert!(model.corpus.contains("ab"));
    }

    #[test]
    fn generate_deterministic() {
        let model = train_test_corpus();
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        assert_eq!(
            model.generate(&mut rng1, 4, 10).unwrap(),
            model.generate(&mut rng2, 4, 10).unwrap()
        );
    }

    #[test]
    fn generate_respects_length_window() {
        let model = train_test_corpus();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..30 {
            let name = model.generate(&mut rng, 4, 9).unwrap();
            let len = name.chars().count();
            assert!((4..=9).contains(&len), "{}", name);
        }
    }

    #[test]
    fn single_name_corpus_echoes_when_nothing_else_exists() {
        let model = MarkovTrainer::train("abc", 2);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.generate(&mut rng, 1, 5).unwrap(), "abc");
    }

    #[test]
    fn impossible_window_is_exhausted() {
        let model = MarkovTrainer::train("abc", 2);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(model.generate(&mut rng, 6, 8), Err(MarkovError::Exhausted(_))));
    }

    #[test]
    fn empty_model_has_no_data() {
        let model = NameMarkovModel::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(model.generate(&mut rng, 1, 5), Err(MarkovError::NoData)));
    }

    #[test]
    fn library_capitalizes_and_reports_unknown_models() {
        let mut library = MarkovLibrary::new();
        library.insert("elvish", train_test_corpus());
        let mut rng = StdRng::seed_from_u64(3);
        let name = library.generate("elvish", &mut rng).unwrap();
        assert!(name.chars().next().unwrap().is_uppercase());
        assert!(library.has_model("elvish"));
        assert!(matches!(
            library.generate("dwarvish", &mut rng),
            Err(MarkovError::UnknownModel(_))
        ));
    }

    #[test]
    fn ron_round_trip() {
        let model = train_test_corpus();
        let serialized = ron::to_string(&model).unwrap();
        let deserialized: NameMarkovModel = ron::from_str(&serialized).unwrap();
        assert_eq!(deserialized.n, model.n);
        assert_eq!(deserialized.transitions.len(), model.transitions.len());
    }

    #[test]
    fn save_and_load_model() {
        let model = train_test_corpus();
        let path = std::path::PathBuf::from("target/test_name_model.ron");
        let _ = std::fs::create_dir_all("target");

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.n, model.n);
        assert_eq!(loaded.corpus.len(), model.corpus.len());

        let _ = std::fs::remove_file(&path);
    }
}
