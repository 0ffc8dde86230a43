/// Style pass: post-processing transforms for synthesized names.
///
/// Works on a name held as ordered pieces (affixes and syllables) so that
/// separators can only land on piece boundaries.
use rand::rngs::StdRng;
use rand::Rng;

use crate::core::sampling::pick_uniform;
use crate::schema::domain::{Capitalization, Style};

/// Letters counted toward name length. Separators are not letters.
pub fn letter_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

/// Probability of forcing a preferred ending for a given boost.
pub fn ending_force_chance(boost: f64) -> f64 {
    if boost <= 0.0 || !boost.is_finite() {
        0.0
    } else {
        boost / (1.0 + boost)
    }
}

/// Replace the tail of `pieces` with a preferred ending, keeping the letter
/// count unchanged. Skipped when the name already ends well or is too short
/// to hold the ending.
pub fn force_preferred_ending(pieces: &mut [String], style: &Style, rng: &mut StdRng) -> bool {
    if style.preferred_endings.is_empty() {
        return false;
    }
    let joined: String = pieces.concat().to_lowercase();
    if style
        .preferred_endings
        .iter()
        .any(|e| !e.is_empty() && joined.ends_with(&e.to_lowercase()))
    {
        return false;
    }
    if !rng.gen_bool(ending_force_chance(style.preferred_ending_boost)) {
        return false;
    }
    let Some(ending) = pick_uniform(&style.preferred_endings, rng) else {
        return false;
    };
    let ending_len = ending.chars().count();
    if ending_len == 0 || ending_len >= joined.chars().count() {
        return false;
    }

    let mut to_remove = ending_len;
    for piece in pieces.iter_mut().rev() {
        while to_remove > 0 && piece.pop().is_some() {
            to_remove -= 1;
        }
        if to_remove == 0 {
            break;
        }
    }
    if let Some(last) = pieces.iter_mut().rev().find(|p| !p.is_empty()) {
        last.push_str(ending);
    } else if let Some(first) = pieces.first_mut() {
        first.push_str(ending);
    }
    true
}

/// Join pieces, inserting an apostrophe or hyphen at each internal boundary
/// by independent Bernoulli draws.
pub fn join_with_separators(pieces: &[String], style: &Style, rng: &mut StdRng) -> String {
    let apostrophe = style.apostrophe_rate.clamp(0.0, 1.0);
    let hyphen = style.hyphen_rate.clamp(0.0, 1.0);
    let mut out = String::new();
    for (i, piece) in pieces.iter().filter(|p| !p.is_empty()).enumerate() {
        if i > 0 {
            if apostrophe > 0.0 && rng.gen_bool(apostrophe) {
                out.push('\'');
            } else if hyphen > 0.0 && rng.gen_bool(hyphen) {
                out.push('-');
            }
        }
        out.push_str(piece);
    }
    out
}

pub fn capitalize(text: &str, capitalization: Capitalization) -> String {
    match capitalization {
        Capitalization::Lower => text.to_lowercase(),
        Capitalization::Upper => text.to_uppercase(),
        Capitalization::Preserve => text.to_string(),
        Capitalization::Title => {
            let mut out = String::with_capacity(text.len());
            let mut start_of_part = true;
            for c in text.chars() {
                if start_of_part && c.is_alphabetic() {
                    out.extend(c.to_uppercase());
                    start_of_part = false;
                } else {
                    out.extend(c.to_lowercase());
                }
                if c == '-' || c == ' ' {
                    start_of_part = true;
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pieces(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn title_case_capitalizes_each_hyphen_part() {
        assert_eq!(capitalize("kal-dur", Capitalization::Title), "Kal-Dur");
        assert_eq!(capitalize("a'lin", Capitalization::Title), "A'lin");
        assert_eq!(capitalize("KALDUR", Capitalization::Title), "Kaldur");
    }

    #[test]
    fn other_capitalizations() {
        assert_eq!(capitalize("Kal", Capitalization::Lower), "kal");
        assert_eq!(capitalize("Kal", Capitalization::Upper), "KAL");
        assert_eq!(capitalize("kAl", Capitalization::Preserve), "kAl");
    }

    #[test]
    fn letter_count_ignores_separators() {
        assert_eq!(letter_count("Kal'dur-an"), 8);
    }

    #[test]
    fn zero_rates_never_insert_separators() {
        let mut rng = StdRng::seed_from_u64(1);
        let style = Style::default();
        for _ in 0..50 {
            assert_eq!(join_with_separators(&pieces(&["ka", "lo", "ri"]), &style, &mut rng), "kalori");
        }
    }

    #[test]
    fn full_apostrophe_rate_marks_every_boundary() {
        let mut rng = StdRng::seed_from_u64(1);
        let style = Style {
            apostrophe_rate: 1.0,
            ..Style::default()
        };
        assert_eq!(join_with_separators(&pieces(&["ka", "lo", "ri"]), &style, &mut rng), "ka'lo'ri");
    }

    #[test]
    fn forced_ending_keeps_length() {
        let mut rng = StdRng::seed_from_u64(9);
        let style = Style {
            preferred_endings: vec!["iel".to_string()],
            preferred_ending_boost: 1e9,
            ..Style::default()
        };
        let mut parts = pieces(&["ka", "lo", "ra"]);
        assert!(force_preferred_ending(&mut parts, &style, &mut rng));
        let joined = parts.concat();
        assert!(joined.ends_with("iel"), "got {}", joined);
        assert_eq!(joined.chars().count(), 6);
    }

    #[test]
    fn existing_ending_left_alone() {
        let mut rng = StdRng::seed_from_u64(9);
        let style = Style {
            preferred_endings: vec!["ra".to_string()],
            preferred_ending_boost: 1e9,
            ..Style::default()
        };
        let mut parts = pieces(&["ka", "ra"]);
        assert!(!force_preferred_ending(&mut parts, &style, &mut rng));
        assert_eq!(parts.concat(), "kara");
    }

    #[test]
    fn force_chance_grows_with_boost() {
        assert_eq!(ending_force_chance(0.0), 0.0);
        assert!(ending_force_chance(1.0) < ending_force_chance(3.0));
        assert!(ending_force_chance(1e6) < 1.0);
    }
}
