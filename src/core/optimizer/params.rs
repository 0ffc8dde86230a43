/// Flat numeric view of the tunable parts of a Domain.
///
/// Layout: consonant weights, vowel weights, template weights, structure
/// weights, then favored_cluster_boost, apostrophe_rate, hyphen_rate,
/// preferred_ending_boost, rhythm_bias, length min, length max. Target length
/// and tolerance describe the goal rather than the generator and are not
/// tuned.
///
/// Weight vectors only matter as ratios, so each is scaled down to fit under
/// the weight ceiling instead of being clipped. Scalar bounds are widened to
/// contain the base domain's own values, so encoding never rewrites them.
use rand::rngs::StdRng;
use rand::Rng;

use crate::core::sampling::standard_normal;
use crate::schema::domain::Domain;

pub type ParamVector = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Weight,
    ClusterBoost,
    Rate,
    EndingBoost,
    Rhythm,
    LengthMin,
    LengthMax,
}

impl ParamKind {
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::Weight | Self::ClusterBoost | Self::EndingBoost => (0.0, 5.0),
            Self::Rate => (0.0, 0.5),
            Self::Rhythm => (0.0, 1.0),
            Self::LengthMin => (1.0, 16.0),
            Self::LengthMax => (1.0, 24.0),
        }
    }
}

/// Shape of the parameter vector for one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpace {
    kinds: Vec<ParamKind>,
    bounds: Vec<(f64, f64)>,
    consonants: usize,
    vowels: usize,
    templates: usize,
    structures: usize,
}

impl ParamSpace {
    pub fn for_domain(domain: &Domain) -> Self {
        let consonants = domain.phonology.consonants.len();
        let vowels = domain.phonology.vowels.len();
        let templates = domain.phonology.syllable_templates.len();
        let structures = domain.morphology.structure.len();
        let mut kinds = vec![ParamKind::Weight; consonants + vowels + templates + structures];
        kinds.extend([
            ParamKind::ClusterBoost,
            ParamKind::Rate,
            ParamKind::Rate,
            ParamKind::EndingBoost,
            ParamKind::Rhythm,
            ParamKind::LengthMin,
            ParamKind::LengthMax,
        ]);
        let mut space = Self {
            bounds: kinds.iter().map(|kind| kind.bounds()).collect(),
            kinds,
            consonants,
            vowels,
            templates,
            structures,
        };
        let own = space.raw_values(domain);
        for ((lo, hi), value) in space.bounds.iter_mut().zip(own) {
            if value.is_finite() {
                *lo = lo.min(value);
                *hi = hi.max(value);
            }
        }
        space
    }

    pub fn dims(&self) -> usize {
        self.kinds.len()
    }

    pub fn kind(&self, index: usize) -> ParamKind {
        self.kinds[index]
    }

    pub fn bounds(&self, index: usize) -> (f64, f64) {
        self.bounds[index]
    }

    pub fn width(&self, index: usize) -> f64 {
        let (lo, hi) = self.bounds[index];
        hi - lo
    }

    pub fn clamp(&self, index: usize, value: f64) -> f64 {
        let (lo, hi) = self.bounds[index];
        if value.is_finite() {
            value.clamp(lo, hi)
        } else {
            lo
        }
    }

    /// Read a domain's parameters. Absent weight arrays read as all ones.
    pub fn encode(&self, domain: &Domain) -> ParamVector {
        self.raw_values(domain)
            .into_iter()
            .enumerate()
            .map(|(i, v)| self.clamp(i, v))
            .collect()
    }

    fn raw_values(&self, domain: &Domain) -> ParamVector {
        let p = &domain.phonology;
        let s = &domain.style;
        let mut params = Vec::with_capacity(self.dims());
        push_weights(&mut params, p.consonant_weights.as_deref(), self.consonants);
        push_weights(&mut params, p.vowel_weights.as_deref(), self.vowels);
        push_weights(&mut params, p.template_weights.as_deref(), self.templates);
        push_weights(&mut params, domain.morphology.structure_weights.as_deref(), self.structures);
        params.extend([
            p.favored_cluster_boost,
            s.apostrophe_rate,
            s.hyphen_rate,
            s.preferred_ending_boost,
            s.rhythm_bias,
            p.length_range.0 as f64,
            p.length_range.1 as f64,
        ]);
        params
    }

    /// Write parameters into a copy of `base`. Lengths are rounded and the
    /// range is ordered so `min <= max`.
    pub fn decode(&self, base: &Domain, params: &[f64]) -> Domain {
        let mut domain = base.clone();
        let values: Vec<f64> = params.iter().enumerate().map(|(i, v)| self.clamp(i, *v)).collect();
        let mut cursor = 0;
        let mut take = |n: usize| {
            let slice = values[cursor..cursor + n].to_vec();
            cursor += n;
            slice
        };

        let consonant_weights = take(self.consonants);
        let vowel_weights = take(self.vowels);
        let template_weights = take(self.templates);
        let structure_weights = take(self.structures);
        let scalars = take(7);

        let p = &mut domain.phonology;
        p.consonant_weights = Some(consonant_weights);
        p.vowel_weights = Some(vowel_weights);
        p.template_weights = Some(template_weights);
        domain.morphology.structure_weights = Some(structure_weights);
        p.favored_cluster_boost = scalars[0];
        domain.style.apostrophe_rate = scalars[1];
        domain.style.hyphen_rate = scalars[2];
        domain.style.preferred_ending_boost = scalars[3];
        domain.style.rhythm_bias = scalars[4];
        let a = scalars[5].round() as usize;
        let b = scalars[6].round() as usize;
        domain.phonology.length_range = (a.min(b), a.max(b));
        domain
    }

    /// Gaussian step on one coordinate, scaled to that coordinate's range.
    pub fn perturb(&self, index: usize, value: f64, scale: f64, rng: &mut StdRng) -> f64 {
        self.clamp(index, value + standard_normal(rng) * scale * self.width(index))
    }

    /// Copy of `point` with one random coordinate perturbed.
    pub fn neighbor(&self, point: &[f64], scale: f64, rng: &mut StdRng) -> ParamVector {
        let mut next = point.to_vec();
        let index = rng.gen_range(0..self.dims());
        next[index] = self.perturb(index, next[index], scale, rng);
        next
    }

    /// Uniform point in the box.
    pub fn random(&self, rng: &mut StdRng) -> ParamVector {
        self.bounds.iter().map(|&(lo, hi)| rng.gen_range(lo..=hi)).collect()
    }
}

fn push_weights(params: &mut ParamVector, weights: Option<&[f64]>, len: usize) {
    let Some(w) = weights.filter(|w| w.len() == len) else {
        params.extend(std::iter::repeat(1.0).take(len));
        return;
    };
    let (_, ceiling) = ParamKind::Weight.bounds();
    let max = w.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
    let scale = if max > ceiling { ceiling / max } else { 1.0 };
    params.extend(w.iter().map(|v| v * scale));
}
