/// Simulated annealing with Metropolis acceptance and geometric cooling.
/// Moves use the same single-coordinate step as hill climbing.
use rand::Rng;

use super::Search;

/// Temperatures below this are treated as zero (greedy acceptance).
const MIN_TEMPERATURE: f64 = 1e-9;

pub(crate) fn run(search: &mut Search<'_, '_>) {
    let total = search.config.iterations;
    let scale = search.config.perturbation_scale;
    let cooling = search.config.cooling_rate;
    let mut temperature = search.config.initial_temperature;
    let mut current = search.initial_params.clone();
    let mut current_score = search.initial_score;

    for _ in 0..total {
        if search.cancelled() {
            break;
        }
        let candidate = search.space.neighbor(&current, scale, &mut search.rng);

        if let Some(score) = search.score_params(&candidate) {
            if accept(score - current_score, temperature, search.rng.gen()) {
                current = candidate;
                current_score = score;
            }
        }
        search.report(current_score, total);
        temperature *= cooling;
    }
}

/// Metropolis criterion for a maximization problem.
fn accept(delta: f64, temperature: f64, draw: f64) -> bool {
    if delta >= 0.0 {
        return true;
    }
    if temperature < MIN_TEMPERATURE {
        return false;
    }
    draw < (delta / temperature).exp()
}
