/// Domain records: one culture's sound system, morphology, and style.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration problems in a Domain. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("domain '{0}' has no consonants")]
    NoConsonants(String),
    #[error("domain '{0}' has no vowels")]
    NoVowels(String),
    #[error("domain '{domain}': {field} has {weights} weights for {elements} elements")]
    WeightLength {
        domain: String,
        field: &'static str,
        weights: usize,
        elements: usize,
    },
    #[error("domain '{domain}': {field} contains a negative or non-finite weight")]
    InvalidWeight { domain: String, field: &'static str },
    #[error("domain '{domain}': invalid length range {min}..={max}")]
    InvalidLengthRange { domain: String, min: usize, max: usize },
    #[error("domain '{domain}': {field} must be a probability, got {value}")]
    InvalidRate {
        domain: String,
        field: &'static str,
        value: f64,
    },
}

/// How the finished name is cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capitalization {
    /// First letter of each hyphen-separated part upper-cased.
    #[default]
    Title,
    Lower,
    Upper,
    /// Leave phoneme casing untouched.
    Preserve,
}

/// Where affixes attach relative to the synthesized root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphStructure {
    Root,
    PrefixRoot,
    RootSuffix,
    PrefixRootSuffix,
}

impl MorphStructure {
    pub fn has_prefix(self) -> bool {
        matches!(self, Self::PrefixRoot | Self::PrefixRootSuffix)
    }

    pub fn has_suffix(self) -> bool {
        matches!(self, Self::RootSuffix | Self::PrefixRootSuffix)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phonology {
    pub consonants: Vec<String>,
    pub vowels: Vec<String>,
    /// Templates over `C` (consonant) and `V` (vowel); any other character is
    /// emitted literally.
    #[serde(default = "default_templates")]
    pub syllable_templates: Vec<String>,
    /// Inclusive bounds on the letter count of the finished name.
    #[serde(default = "default_length_range")]
    pub length_range: (usize, usize),
    #[serde(default)]
    pub favored_clusters: Vec<String>,
    #[serde(default)]
    pub forbidden_clusters: Vec<String>,
    #[serde(default = "default_cluster_boost")]
    pub favored_cluster_boost: f64,
    #[serde(default)]
    pub consonant_weights: Option<Vec<f64>>,
    #[serde(default)]
    pub vowel_weights: Option<Vec<f64>>,
    #[serde(default)]
    pub template_weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Morphology {
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub structure: Vec<MorphStructure>,
    #[serde(default)]
    pub structure_weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub capitalization: Capitalization,
    /// Chance of an apostrophe at each syllable boundary.
    pub apostrophe_rate: f64,
    /// Chance of a hyphen at each syllable boundary.
    pub hyphen_rate: f64,
    pub preferred_endings: Vec<String>,
    pub preferred_ending_boost: f64,
    /// Chance of adding another syllable once the minimum length is reached.
    pub rhythm_bias: f64,
    pub target_length: usize,
    pub length_tolerance: usize,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            capitalization: Capitalization::Title,
            apostrophe_rate: 0.0,
            hyphen_rate: 0.0,
            preferred_endings: Vec::new(),
            preferred_ending_boost: 0.0,
            rhythm_bias: 0.5,
            target_length: 6,
            length_tolerance: 2,
        }
    }
}

/// A named bundle of phonological, morphological, and stylistic rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub culture_id: String,
    pub phonology: Phonology,
    #[serde(default)]
    pub morphology: Morphology,
    #[serde(default)]
    pub style: Style,
}

fn default_templates() -> Vec<String> {
    vec!["CV".to_string(), "CVC".to_string()]
}

fn default_length_range() -> (usize, usize) {
    (3, 9)
}

fn default_cluster_boost() -> f64 {
    1.0
}

impl Phonology {
    /// Minimal phonology over the given inventories with default templates.
    pub fn new(consonants: &[&str], vowels: &[&str]) -> Self {
        Self {
            consonants: consonants.iter().map(|s| s.to_string()).collect(),
            vowels: vowels.iter().map(|s| s.to_string()).collect(),
            syllable_templates: default_templates(),
            length_range: default_length_range(),
            favored_clusters: Vec::new(),
            forbidden_clusters: Vec::new(),
            favored_cluster_boost: default_cluster_boost(),
            consonant_weights: None,
            vowel_weights: None,
            template_weights: None,
        }
    }

    /// Every character that can come out of a consonant slot.
    pub fn consonant_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.consonants.iter().flat_map(|c| c.chars()).flat_map(char::to_lowercase)
    }

    /// Every character that can come out of a vowel slot.
    pub fn vowel_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.vowels.iter().flat_map(|v| v.chars()).flat_map(char::to_lowercase)
    }
}

impl Domain {
    pub fn new(id: &str, culture_id: &str, phonology: Phonology) -> Self {
        Self {
            id: id.to_string(),
            culture_id: culture_id.to_string(),
            phonology,
            morphology: Morphology::default(),
            style: Style::default(),
        }
    }

    /// Check only what makes synthesis impossible.
    pub fn check_inventory(&self) -> Result<(), DomainError> {
        if self.phonology.consonants.is_empty() {
            return Err(DomainError::NoConsonants(self.id.clone()));
        }
        if self.phonology.vowels.is_empty() {
            return Err(DomainError::NoVowels(self.id.clone()));
        }
        Ok(())
    }

    /// Full load-time validation: inventories, weight arrays, ranges, rates.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.check_inventory()?;

        let p = &self.phonology;
        self.check_weights("consonant_weights", p.consonant_weights.as_deref(), p.consonants.len())?;
        self.check_weights("vowel_weights", p.vowel_weights.as_deref(), p.vowels.len())?;
        self.check_weights(
            "template_weights",
            p.template_weights.as_deref(),
            p.syllable_templates.len(),
        )?;
        self.check_weights(
            "structure_weights",
            self.morphology.structure_weights.as_deref(),
            self.morphology.structure.len(),
        )?;

        let (min, max) = p.length_range;
        if min == 0 || min > max {
            return Err(DomainError::InvalidLengthRange {
                domain: self.id.clone(),
                min,
                max,
            });
        }

        for (field, value) in [
            ("apostrophe_rate", self.style.apostrophe_rate),
            ("hyphen_rate", self.style.hyphen_rate),
            ("rhythm_bias", self.style.rhythm_bias),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidRate {
                    domain: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        for (field, value) in [
            ("favored_cluster_boost", p.favored_cluster_boost),
            ("preferred_ending_boost", self.style.preferred_ending_boost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::InvalidWeight {
                    domain: self.id.clone(),
                    field,
                });
            }
        }
        Ok(())
    }

    fn check_weights(
        &self,
        field: &'static str,
        weights: Option<&[f64]>,
        elements: usize,
    ) -> Result<(), DomainError> {
        let Some(weights) = weights else {
            return Ok(());
        };
        if weights.len() != elements {
            return Err(DomainError::WeightLength {
                domain: self.id.clone(),
                field,
                weights: weights.len(),
                elements,
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DomainError::InvalidWeight {
                domain: self.id.clone(),
                field,
            });
        }
        Ok(())
    }
}
