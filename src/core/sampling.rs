/// Shared random-draw helpers.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::Rng;

/// Pick an index in `0..len`, weighted when `weights` is usable.
///
/// Weights are ignored (uniform draw) when absent, of the wrong length,
/// or summing to zero. Returns `None` only when `len == 0`.
pub fn pick_index(weights: Option<&[f64]>, len: usize, rng: &mut StdRng) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if let Some(w) = weights.filter(|w| w.len() == len) {
        if let Ok(dist) = WeightedIndex::new(w) {
            return Some(dist.sample(rng));
        }
    }
    Some(rng.gen_range(0..len))
}

/// Pick one element uniformly.
pub fn pick_uniform<'a, T>(items: &'a [T], rng: &mut StdRng) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[rng.gen_range(0..items.len())])
    }
}

/// Derive an independent seed for stream `stream` of a base seed (splitmix64).
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base
        .wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Standard normal draw via Box-Muller.
pub fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
