//! Text normalization, term extraction and synonym expansion

use super::patterns::{CONTRACTIONS, STOP_WORDS, SYNONYMS};

/// Lowercase, collapse whitespace, expand contractions
pub fn normalize(text: &str) -> String {
    let mut normalized = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    for (contraction, expansion) in CONTRACTIONS {
        if normalized.contains(contraction) {
            normalized = normalized.replace(contraction, expansion);
        }
    }
    normalized
}

/// Whitespace tokens with surrounding punctuation stripped
///
/// Interior punctuation survives, so `sole.jpg` stays one token.
pub fn tokenize(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|t| !t.is_empty())
}

/// Search terms: stop words and tokens of two characters or fewer dropped,
/// each survivor expanded through the synonym table
///
/// Deduplicated; first occurrence wins.
pub fn extract_terms(normalized: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(normalized) {
        if STOP_WORDS.iter().any(|w| *w == token) || token.chars().count() <= 2 {
            continue;
        }
        for term in expand_term(token) {
            if !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
    }
    terms
}

/// The term followed by every related word
///
/// A canonical word expands to all its variants; a variant expands to its
/// canonical word only.
pub fn expand_term(term: &str) -> Vec<&str> {
    let mut expanded = vec![term];
    for (canonical, variants) in SYNONYMS {
        if variants.iter().any(|v| *v == term) {
            expanded.push(*canonical);
        } else if *canonical == term {
            for variant in variants.iter() {
                expanded.push(*variant);
            }
        }
    }
    expanded
}

/// Words interchangeable with `word`: its canonical form and sibling variants,
/// or all variants of a canonical word
pub fn related_words(word: &str) -> Vec<&'static str> {
    let mut related = Vec::new();
    for (canonical, variants) in SYNONYMS {
        if *canonical == word {
            related.extend(variants.iter().copied());
        } else if variants.iter().any(|v| *v == word) {
            related.push(*canonical);
            related.extend(variants.iter().copied().filter(|v| *v != word));
        }
    }
    related
}

/// Copies of `query` with one word swapped for a related word
///
/// Ordered by word position, then by table order.
pub fn synonym_substitutions(query: &str) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut out = Vec::new();
    for (i, word) in words.iter().enumerate() {
        for replacement in related_words(&word.to_lowercase()) {
            let mut swapped = words.clone();
            swapped[i] = replacement;
            out.push(swapped.join(" "));
        }
    }
    out
}
