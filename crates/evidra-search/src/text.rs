//! Trigram text similarity
//!
//! Lightweight lexical matching used as the second leg of hybrid
//! retrieval. Text is lowercased and non-alphanumeric runs collapse to
//! single spaces before trigrams are taken, so punctuation and casing
//! do not affect the score.

use std::collections::HashSet;

fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

fn trigrams(text: &str) -> HashSet<Vec<char>> {
    let chars: Vec<char> = normalize(text).chars().collect();
    if chars.len() < 3 {
        if chars.is_empty() {
            return HashSet::new();
        }
        let mut set = HashSet::new();
        set.insert(chars);
        return set;
    }
    chars.windows(3).map(|w| w.to_vec()).collect()
}

/// Jaccard similarity over character trigrams, in [0, 1]
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let set_a = trigrams(a);
    let set_b = trigrams(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        let score = trigram_similarity("creatine improves strength", "creatine improves strength");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let score = trigram_similarity("Creatine improves strength!", "creatine improves strength");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let score = trigram_similarity("creatine supplementation", "zebra migration patterns");
        assert!(score < 0.1);
    }

    #[test]
    fn test_partial_overlap_in_between() {
        let score = trigram_similarity(
            "protein intake increases muscle mass",
            "protein intake increases strength",
        );
        assert!(score > 0.3);
        assert!(score < 1.0);
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(trigram_similarity("", "protein"), 0.0);
        assert_eq!(trigram_similarity("protein", ""), 0.0);
    }

    #[test]
    fn test_short_text_compares_whole() {
        assert!(trigram_similarity("hi", "hi") > 0.99);
        assert_eq!(trigram_similarity("hi", "yo"), 0.0);
    }
}
