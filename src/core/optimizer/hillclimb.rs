/// Hill climbing: perturb one parameter per step, keep the move only when it
/// improves on the current point.
use super::Search;

pub(crate) fn run(search: &mut Search<'_, '_>) {
    let total = search.config.iterations;
    let scale = search.config.perturbation_scale;
    let mut current = search.initial_params.clone();
    let mut current_score = search.initial_score;

    for _ in 0..total {
        if search.cancelled() {
            break;
        }
        let candidate = search.space.neighbor(&current, scale, &mut search.rng);

        if let Some(score) = search.score_params(&candidate) {
            if score > current_score {
                current = candidate;
                current_score = score;
            }
        }
        search.report(current_score, total);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::fitness::{FitnessSettings, FitnessWeights};
    use crate::core::optimizer::{optimize, Algorithm, AlgorithmConfig};
    use crate::schema::domain::{Domain, Phonology};

    #[test]
    fn finds_improvement_on_degenerate_domain() {
        // Almost every name is one consonant repeated: plenty of room to climb.
        let mut phonology = Phonology::new(&["k", "t", "r", "s", "m"], &["a", "o", "i"]);
        phonology.consonant_weights = Some(vec![5.0, 0.01, 0.01, 0.01, 0.01]);
        phonology.vowel_weights = Some(vec![5.0, 0.01, 0.01]);
        phonology.length_range = (4, 4);
        let domain = Domain::new("flat", "test", phonology);
        let settings = FitnessSettings {
            required_names: 30,
            sample_factor: 1.0,
            seed: 1,
            parallel: false,
            ..FitnessSettings::default()
        };
        let config = AlgorithmConfig {
            iterations: 40,
            perturbation_scale: 0.4,
            ..AlgorithmConfig::for_algorithm(Algorithm::Hillclimb)
        };
        let result = optimize(&domain, &settings, &FitnessWeights::default(), &config, &[], None).unwrap();
        assert!(result.improvement > 0.0, "{:?}", result.final_breakdown);
        assert_eq!(result.iterations_run, 40);
    }
}
