/// Generational genetic algorithm: elitism, tournament or roulette parent
/// selection, uniform crossover, per-gene Gaussian mutation.
use rand::rngs::StdRng;
use rand::Rng;

use super::params::ParamVector;
use super::{Search, Selection};
use crate::core::sampling::pick_index;

/// Fitness assigned to individuals whose domain failed to evaluate.
const INVALID: f64 = f64::NEG_INFINITY;

struct Individual {
    genes: ParamVector,
    score: f64,
}

pub(crate) fn run(search: &mut Search<'_, '_>) {
    let total = search.config.iterations;
    let size = search.config.population_size;
    let elitism = search.config.elitism;
    let scale = search.config.perturbation_scale;
    let mutation_rate = search.config.mutation_rate;

    // Seed population: the original, then heavy mutants of it, then uniform
    // random points for diversity.
    let mut population = vec![Individual {
        genes: search.initial_params.clone(),
        score: search.initial_score,
    }];
    let origin = search.initial_params.clone();
    while population.len() < size {
        if search.cancelled() {
            return;
        }
        let genes = if population.len() % 2 == 1 {
            mutate(search, &origin, 0.5, scale * 2.0)
        } else {
            search.space.random(&mut search.rng)
        };
        let score = search.score_params(&genes).unwrap_or(INVALID);
        population.push(Individual { genes, score });
    }

    for _ in 0..total {
        if search.cancelled() {
            break;
        }
        population.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut next: Vec<Individual> = population
            .iter()
            .take(elitism)
            .map(|ind| Individual {
                genes: ind.genes.clone(),
                score: ind.score,
            })
            .collect();
        while next.len() < size {
            let a = select(&population, search.config.selection, search.config.tournament_size, &mut search.rng);
            let b = select(&population, search.config.selection, search.config.tournament_size, &mut search.rng);
            let child = crossover(&population[a].genes, &population[b].genes, &mut search.rng);
            let child = mutate(search, &child, mutation_rate, scale);
            let score = search.score_params(&child).unwrap_or(INVALID);
            next.push(Individual { genes: child, score });
        }
        population = next;

        let generation_best = population.iter().map(|i| i.score).fold(INVALID, f64::max);
        search.report(generation_best, total);
    }
}

fn select(population: &[Individual], selection: Selection, tournament_size: usize, rng: &mut StdRng) -> usize {
    match selection {
        Selection::Tournament => {
            let mut best = rng.gen_range(0..population.len());
            for _ in 1..tournament_size {
                let challenger = rng.gen_range(0..population.len());
                if population[challenger].score > population[best].score {
                    best = challenger;
                }
            }
            best
        }
        Selection::Roulette => {
            // Shift scores so the worst valid individual still has a small
            // chance; invalid individuals get none.
            let floor = population
                .iter()
                .map(|i| i.score)
                .filter(|s| s.is_finite())
                .fold(f64::INFINITY, f64::min);
            let weights: Vec<f64> = population
                .iter()
                .map(|i| {
                    if i.score.is_finite() {
                        i.score - floor + 1e-3
                    } else {
                        0.0
                    }
                })
                .collect();
            pick_index(Some(&weights), population.len(), rng).unwrap_or(0)
        }
    }
}

/// Uniform crossover: each gene from either parent with equal chance.
fn crossover(a: &[f64], b: &[f64], rng: &mut StdRng) -> ParamVector {
    a.iter()
        .zip(b)
        .map(|(x, y)| if rng.gen_bool(0.5) { *x } else { *y })
        .collect()
}

fn mutate(search: &mut Search<'_, '_>, genes: &[f64], rate: f64, scale: f64) -> ParamVector {
    genes
        .iter()
        .enumerate()
        .map(|(i, g)| {
            if search.rng.gen_bool(rate) {
                search.space.perturb(i, *g, scale, &mut search.rng)
            } else {
                *g
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn population(scores: &[f64]) -> Vec<Individual> {
        scores
            .iter()
            .map(|s| Individual {
                genes: vec![*s],
                score: *s,
            })
            .collect()
    }

    #[test]
    fn full_tournament_picks_best_often() {
        let pop = population(&[0.1, 0.9, 0.3, 0.2]);
        let mut rng = StdRng::seed_from_u64(2);
        let wins = (0..200)
            .filter(|_| select(&pop, Selection::Tournament, 4, &mut rng) == 1)
            .count();
        assert!(wins > 100, "{}", wins);
    }

    #[test]
    fn roulette_never_picks_invalid() {
        let pop = population(&[f64::NEG_INFINITY, 0.5, 0.6]);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            assert_ne!(select(&pop, Selection::Roulette, 0, &mut rng), 0);
        }
    }

    #[test]
    fn crossover_mixes_parents() {
        let a = vec![0.0; 32];
        let b = vec![1.0; 32];
        let mut rng = StdRng::seed_from_u64(7);
        let child = crossover(&a, &b, &mut rng);
        assert!(child.iter().all(|g| *g == 0.0 || *g == 1.0));
        assert!(child.contains(&0.0) && child.contains(&1.0));
    }
}
