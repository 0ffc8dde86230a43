/// Phonotactic name synthesis driven by a `Domain`.
///
/// Pipeline: choose morphology structure and affixes, build a root from
/// syllable templates within the remaining length budget, optionally force a
/// preferred ending, join with style separators, then apply capitalization.
/// Constraint violations (length, forbidden clusters) are resolved by bounded
/// retries and then relaxed; they are never surfaced as errors.
use log::trace;
use rand::rngs::StdRng;
use rand::Rng;

use crate::core::sampling::{pick_index, pick_uniform};
use crate::core::style::{capitalize, force_preferred_ending, join_with_separators, letter_count};
use crate::schema::domain::{Domain, DomainError, MorphStructure, Phonology};

/// Redraws allowed per slot before a forbidden cluster is tolerated.
const MAX_CLUSTER_RETRIES: usize = 6;
/// Whole-root rebuilds before falling back to truncation/padding.
const MAX_LENGTH_ATTEMPTS: usize = 8;
/// Hard cap on syllables in one root.
const MAX_SYLLABLES: usize = 12;

/// A synthesized name plus a record of any constraint that had to be relaxed.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub name: String,
    /// Root length could not be hit by rebuilding and was truncated or padded.
    pub length_adjusted: bool,
    /// Number of slots that accepted a forbidden cluster after retries.
    pub relaxed_clusters: usize,
    /// Affixes were dropped because they alone exceeded the length range.
    pub affixes_dropped: bool,
}

/// Generate one name. Fails only when the domain has no consonants or vowels.
pub fn synthesize(domain: &Domain, rng: &mut StdRng) -> Result<String, DomainError> {
    synthesize_detailed(domain, rng).map(|s| s.name)
}

pub fn synthesize_detailed(domain: &Domain, rng: &mut StdRng) -> Result<Synthesis, DomainError> {
    domain.check_inventory()?;
    let phonology = &domain.phonology;
    let (min_len, max_len) = normalized_range(phonology.length_range);

    let morphology = &domain.morphology;
    let structure = pick_index(
        morphology.structure_weights.as_deref(),
        morphology.structure.len(),
        rng,
    )
    .map(|i| morphology.structure[i])
    .unwrap_or(MorphStructure::Root);

    let mut prefix = if structure.has_prefix() {
        pick_uniform(&morphology.prefixes, rng).cloned()
    } else {
        None
    };
    let mut suffix = if structure.has_suffix() {
        pick_uniform(&morphology.suffixes, rng).cloned()
    } else {
        None
    };

    let mut affix_len = prefix.as_deref().map_or(0, letter_count) + suffix.as_deref().map_or(0, letter_count);
    let affixes_dropped = affix_len > 0 && affix_len + 1 > max_len;
    if affixes_dropped {
        trace!("domain '{}': affixes exceed length range, dropping", domain.id);
        prefix = None;
        suffix = None;
        affix_len = 0;
    }
    let root_min = min_len.saturating_sub(affix_len).max(1);
    let root_max = max_len.saturating_sub(affix_len).max(root_min);

    let context = prefix.as_deref().unwrap_or("").to_lowercase();
    let mut relaxed_clusters = 0;
    let mut best: Option<Vec<String>> = None;
    let mut best_miss = usize::MAX;
    for _ in 0..MAX_LENGTH_ATTEMPTS {
        let (syllables, relaxed) = build_root(domain, &context, root_min, root_max, rng);
        relaxed_clusters += relaxed;
        let len = syllables.iter().map(|s| letter_count(s)).sum::<usize>();
        let miss = if len < root_min {
            root_min - len
        } else {
            len.saturating_sub(root_max)
        };
        if miss < best_miss {
            best_miss = miss;
            best = Some(syllables);
        }
        if miss == 0 {
            break;
        }
    }
    let mut root = best.unwrap_or_default();
    let length_adjusted = best_miss > 0;
    if length_adjusted {
        fit_length(&mut root, phonology, root_min, root_max, rng);
    }

    if suffix.is_none() {
        force_preferred_ending(&mut root, &domain.style, rng);
    }

    let mut pieces = Vec::with_capacity(root.len() + 2);
    pieces.extend(prefix);
    pieces.extend(root);
    pieces.extend(suffix);

    let joined = join_with_separators(&pieces, &domain.style, rng);
    Ok(Synthesis {
        name: capitalize(&joined, domain.style.capitalization),
        length_adjusted,
        relaxed_clusters,
        affixes_dropped,
    })
}

/// Clamp a configured range into something satisfiable (`1 <= min <= max`).
pub fn normalized_range((min, max): (usize, usize)) -> (usize, usize) {
    let min = min.max(1);
    (min, max.max(min))
}

fn build_root(
    domain: &Domain,
    prefix_context: &str,
    root_min: usize,
    root_max: usize,
    rng: &mut StdRng,
) -> (Vec<String>, usize) {
    let phonology = &domain.phonology;
    let continue_chance = domain.style.rhythm_bias.clamp(0.0, 1.0);
    let mut syllables: Vec<String> = Vec::new();
    let mut context = prefix_context.to_string();
    let mut len = 0;
    let mut relaxed = 0;

    loop {
        let template = pick_index(
            phonology.template_weights.as_deref(),
            phonology.syllable_templates.len(),
            rng,
        )
        .map(|i| phonology.syllable_templates[i].as_str())
        .unwrap_or("CV");

        let mut syllable = String::new();
        for slot in template.chars() {
            let piece = match slot {
                'C' => {
                    let (p, r) = draw_phoneme(
                        &phonology.consonants,
                        phonology.consonant_weights.as_deref(),
                        &context,
                        phonology,
                        rng,
                    );
                    relaxed += r as usize;
                    p
                }
                'V' => {
                    let (p, r) = draw_phoneme(
                        &phonology.vowels,
                        phonology.vowel_weights.as_deref(),
                        &context,
                        phonology,
                        rng,
                    );
                    relaxed += r as usize;
                    p
                }
                literal => literal.to_string(),
            };
            context.push_str(&piece.to_lowercase());
            syllable.push_str(&piece);
        }

        len += letter_count(&syllable);
        syllables.push(syllable);
        if len >= root_max || syllables.len() >= MAX_SYLLABLES {
            break;
        }
        if len >= root_min && !rng.gen_bool(continue_chance) {
            break;
        }
    }
    (syllables, relaxed)
}

/// Draw one phoneme, boosting favored clusters and avoiding forbidden ones.
/// Returns the phoneme and whether a forbidden cluster had to be accepted.
fn draw_phoneme(
    inventory: &[String],
    weights: Option<&[f64]>,
    context: &str,
    phonology: &Phonology,
    rng: &mut StdRng,
) -> (String, bool) {
    let base: Vec<f64> = match weights {
        Some(w) if w.len() == inventory.len() && w.iter().sum::<f64>() > 0.0 => w.to_vec(),
        _ => vec![1.0; inventory.len()],
    };
    let boost = 1.0 + phonology.favored_cluster_boost.max(0.0);
    let boosted: Vec<f64> = inventory
        .iter()
        .zip(&base)
        .map(|(item, w)| {
            if phonology
                .favored_clusters
                .iter()
                .any(|c| spans_cluster(context, item, c))
            {
                w * boost
            } else {
                *w
            }
        })
        .collect();

    let is_forbidden = |item: &str| {
        phonology
            .forbidden_clusters
            .iter()
            .any(|c| spans_cluster(context, item, c))
    };

    let mut last = None;
    for _ in 0..MAX_CLUSTER_RETRIES {
        let Some(i) = pick_index(Some(&boosted), inventory.len(), rng) else {
            break;
        };
        if !is_forbidden(&inventory[i]) {
            return (inventory[i].clone(), false);
        }
        last = Some(i);
    }

    let allowed: Vec<f64> = inventory
        .iter()
        .zip(&boosted)
        .map(|(item, w)| if is_forbidden(item) { 0.0 } else { *w })
        .collect();
    if allowed.iter().any(|w| *w > 0.0) {
        if let Some(i) = pick_index(Some(&allowed), inventory.len(), rng) {
            return (inventory[i].clone(), false);
        }
    }

    let i = last.unwrap_or(0);
    trace!("relaxing forbidden cluster after '{}' + '{}'", context, inventory[i]);
    (inventory[i].clone(), true)
}

/// True when appending `item` to `context` creates `cluster` across the
/// junction (or `item` itself contains it).
fn spans_cluster(context: &str, item: &str, cluster: &str) -> bool {
    if cluster.is_empty() {
        return false;
    }
    let cluster = cluster.to_lowercase();
    let keep = cluster.chars().count().saturating_sub(1);
    let tail: String = {
        let chars: Vec<char> = context.chars().collect();
        chars[chars.len().saturating_sub(keep)..].iter().collect()
    };
    let joined = format!("{}{}", tail, item.to_lowercase());
    joined.contains(&cluster)
}

/// Truncate or pad a root so its letter count lands in `[min, max]`.
fn fit_length(root: &mut Vec<String>, phonology: &Phonology, min: usize, max: usize, rng: &mut StdRng) {
    let mut len: usize = root.iter().map(|s| letter_count(s)).sum();
    while len > max {
        let Some(last) = root.last_mut() else {
            break;
        };
        match last.pop() {
            Some(c) if c.is_alphabetic() => len -= 1,
            Some(_) => {}
            None => {
                root.pop();
            }
        }
    }
    root.retain(|s| !s.is_empty());

    if len < min && root.is_empty() {
        root.push(String::new());
    }
    while len < min {
        let ends_in_vowel = root
            .last()
            .and_then(|s| s.chars().last())
            .map(|c| phonology.vowel_chars().any(|v| v == c.to_ascii_lowercase()))
            .unwrap_or(false);
        let inventory = if ends_in_vowel {
            &phonology.consonants
        } else {
            &phonology.vowels
        };
        let Some(piece) = pick_uniform(inventory, rng) else {
            break;
        };
        let remaining = min - len;
        let take: String = piece.chars().filter(|c| c.is_alphabetic()).take(remaining).collect();
        if take.is_empty() {
            break;
        }
        len += take.chars().count();
        if let Some(last) = root.last_mut() {
            last.push_str(&take);
        }
    }
}
