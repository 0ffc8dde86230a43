/// Cluster discovery: a one-shot heuristic rather than an iterative search.
///
/// Counts adjacent consonant-consonant and vowel-vowel pairs across the
/// domain's own sample and its siblings' samples, keeps the frequent pairs
/// the inventory can actually produce that are neither favored nor
/// forbidden yet, then tries them most frequent first, adding each to
/// `favored_clusters` only if fitness does not drop.
use log::debug;
use rustc_hash::FxHashSet;
use std::collections::HashMap;

use super::Search;
use crate::schema::domain::Domain;

pub(crate) fn run(search: &mut Search<'_, '_>) {
    if search.cancelled() {
        return;
    }
    let own: Vec<String> = search.best_report.names.clone();
    let corpus = own.iter().map(String::as_str).chain(search.evaluator.sibling_names());
    let found = discover(
        search.base,
        corpus,
        search.config.cluster_min_frequency,
        search.config.cluster_max_additions,
    );
    if found.is_empty() {
        debug!("cluster discovery '{}': nothing new above threshold", search.base.id);
        search.report(search.initial_score, 1);
        return;
    }

    let mut current = search.base.clone();
    let mut current_score = search.initial_score;
    let mut kept = Vec::new();
    for cluster in &found {
        if search.cancelled() {
            break;
        }
        let mut candidate = current.clone();
        candidate.phonology.favored_clusters.push(cluster.clone());
        let Some(report) = search.evaluate_candidate(&candidate) else {
            continue;
        };
        if report.score >= current_score {
            current_score = report.score;
            current = candidate.clone();
            search.keep_best(candidate, report);
            kept.push(cluster.as_str());
        }
    }
    debug!(
        "cluster discovery '{}': proposed {:?}, kept {:?}",
        search.base.id, found, kept
    );
    search.report(current_score, 1);
}

/// Frequent same-class pairs in `corpus` that `domain` can realize but does
/// not yet mention, most frequent first (ties alphabetical).
pub fn discover<'a>(
    domain: &Domain,
    corpus: impl Iterator<Item = &'a str>,
    min_frequency: f64,
    max_additions: usize,
) -> Vec<String> {
    let consonants: FxHashSet<char> = domain.phonology.consonant_chars().collect();
    let vowels: FxHashSet<char> = domain.phonology.vowel_chars().collect();
    let known: FxHashSet<String> = domain
        .phonology
        .favored_clusters
        .iter()
        .chain(&domain.phonology.forbidden_clusters)
        .map(|c| c.to_lowercase())
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut pairs = 0usize;
    for name in corpus {
        let letters: Vec<char> = name
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect();
        for pair in letters.windows(2) {
            pairs += 1;
            let same_class = (consonants.contains(&pair[0]) && consonants.contains(&pair[1]))
                || (vowels.contains(&pair[0]) && vowels.contains(&pair[1]));
            if !same_class {
                continue;
            }
            let cluster: String = pair.iter().collect();
            if !known.contains(&cluster) {
                *counts.entry(cluster).or_default() += 1;
            }
        }
    }
    if pairs == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count as f64 / pairs as f64 >= min_frequency)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max_additions).map(|(c, _)| c).collect()
}
