/// Tree-structured Parzen estimator, one independent density per dimension.
///
/// After a uniform warmup, history is split at the `tpe_gamma` quantile into
/// good and bad trials. Candidates are drawn around good trials and the one
/// maximizing `log l(x) - log g(x)` is evaluated next, where `l` and `g` are
/// Gaussian mixtures over the good and bad trials, each blended with a
/// uniform prior over the parameter's range.
use rand::rngs::StdRng;
use rand::Rng;

use super::params::{ParamSpace, ParamVector};
use super::Search;
use crate::core::sampling::standard_normal;

/// Smallest kernel bandwidth as a fraction of a parameter's range.
const MIN_BANDWIDTH: f64 = 0.02;

struct Trial {
    params: ParamVector,
    score: f64,
}

pub(crate) fn run(search: &mut Search<'_, '_>) {
    let total = search.config.iterations;
    let gamma = search.config.tpe_gamma;
    let warmup = search.config.tpe_warmup.max(2);
    let draws = search.config.tpe_candidates;

    let mut history = vec![Trial {
        params: search.initial_params.clone(),
        score: search.initial_score,
    }];

    for _ in 0..total {
        if search.cancelled() {
            break;
        }
        let candidate = if history.len() < warmup {
            search.space.random(&mut search.rng)
        } else {
            history.sort_by(|a, b| b.score.total_cmp(&a.score));
            let n_good = ((gamma * history.len() as f64).ceil() as usize).clamp(1, history.len() - 1);
            let (good, bad) = history.split_at(n_good);
            let good: Vec<&ParamVector> = good.iter().map(|t| &t.params).collect();
            let bad: Vec<&ParamVector> = bad.iter().map(|t| &t.params).collect();

            let mut best: Option<(ParamVector, f64)> = None;
            for _ in 0..draws {
                let x = sample_around(&search.space, &good, &mut search.rng);
                let ratio = log_density(&search.space, &good, &x) - log_density(&search.space, &bad, &x);
                if best.as_ref().map_or(true, |(_, r)| ratio > *r) {
                    best = Some((x, ratio));
                }
            }
            match best {
                Some((x, _)) => x,
                None => search.space.random(&mut search.rng),
            }
        };

        let score = search.score_params(&candidate);
        if let Some(score) = score {
            history.push(Trial {
                params: candidate,
                score,
            });
        }
        let current = score.unwrap_or(f64::NEG_INFINITY);
        search.report(current, total);
    }
}

fn bandwidth(space: &ParamSpace, dim: usize, points: usize) -> f64 {
    let width = space.width(dim);
    (width / (points.max(1) as f64).sqrt() * 0.5).max(width * MIN_BANDWIDTH)
}

/// Pick a good trial at random and jitter every coordinate by its kernel.
fn sample_around(space: &ParamSpace, good: &[&ParamVector], rng: &mut StdRng) -> ParamVector {
    let center = good[rng.gen_range(0..good.len())];
    center
        .iter()
        .enumerate()
        .map(|(d, v)| space.clamp(d, v + standard_normal(rng) * bandwidth(space, d, good.len())))
        .collect()
}

/// Sum over dimensions of the log mixture density at `x`.
fn log_density(space: &ParamSpace, points: &[&ParamVector], x: &[f64]) -> f64 {
    let components = points.len() as f64 + 1.0;
    x.iter()
        .enumerate()
        .map(|(d, xv)| {
            let width = space.width(d).max(f64::EPSILON);
            let bw = bandwidth(space, d, points.len());
            let kernels: f64 = points.iter().map(|p| normal_pdf(*xv, p[d], bw)).sum();
            ((kernels + 1.0 / width) / components).max(f64::MIN_POSITIVE).ln()
        })
        .sum()
}

fn normal_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    (-0.5 * z * z).exp() / (sd * (2.0 * std::f64::consts::PI).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::domain::{Domain, Phonology};
    use rand::SeedableRng;

    fn space() -> ParamSpace {
        ParamSpace::for_domain(&Domain::new("d", "c", Phonology::new(&["k"], &["a"])))
    }

    #[test]
    fn density_peaks_near_points() {
        let space = space();
        let point: ParamVector = vec![1.0; space.dims()];
        let near = log_density(&space, &[&point], &point);
        let mut far = point.clone();
        far[0] = 5.0;
        assert!(near > log_density(&space, &[&point], &far));
    }

    #[test]
    fn samples_stay_in_bounds() {
        let space = space();
        let point: ParamVector = vec![0.0; space.dims()];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let x = sample_around(&space, &[&point], &mut rng);
            for (d, v) in x.iter().enumerate() {
                let (lo, hi) = space.bounds(d);
                assert!((lo..=hi).contains(v));
            }
        }
    }
}
