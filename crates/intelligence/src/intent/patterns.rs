//! Fixed vocabulary of the intent extractor
//!
//! Regex groups are compiled once on first use. Every pattern is applied to
//! lowercased text, except the image path patterns which run on the raw
//! query so the returned path keeps its case.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

// ============================================================================
// Normalization tables
// ============================================================================

/// Applied in order; the full forms must precede the bare suffixes
pub(crate) const CONTRACTIONS: &[(&str, &str)] = &[
    ("don't", "do not"),
    ("won't", "will not"),
    ("can't", "cannot"),
    ("n't", " not"),
    ("'re", " are"),
    ("'s", " is"),
    ("'ve", " have"),
    ("'ll", " will"),
];

pub(crate) const STOP_WORDS: &[&str] = &[
    "with", "that", "have", "are", "is", "in", "of", "for", "and", "or", "the", "a", "an",
    "this", "these", "those", "my", "your", "his", "her",
];

/// canonical -> variants; lookups go both ways
pub(crate) const SYNONYMS: &[(&str, &[&str])] = &[
    ("shoe", &["shoes", "sneaker", "sneakers", "footwear", "footgear"]),
    ("red", &["crimson", "scarlet", "burgundy", "maroon"]),
    ("blue", &["navy", "azure", "cobalt", "royal"]),
    ("black", &["ebony", "charcoal", "jet"]),
    ("white", &["ivory", "cream", "pearl"]),
    ("large", &["big", "huge", "oversized"]),
    ("small", &["tiny", "mini", "petite"]),
    ("round", &["circular", "spherical"]),
    ("square", &["rectangular", "boxy"]),
    ("athletic", &["sport", "sports", "fitness", "exercise"]),
];

/// Product-line phrases resolved to a canonical brand, checked by substring
pub(crate) const BRAND_ALIASES: &[(&str, &str)] = &[
    ("nike air", "nike"),
    ("air jordan", "jordan"),
    ("jordan brand", "jordan"),
    ("adidas originals", "adidas"),
    ("three stripes", "adidas"),
    ("puma suede", "puma"),
    ("converse chuck", "converse"),
    ("chuck taylor", "converse"),
    ("vans old skool", "vans"),
    ("reebok classic", "reebok"),
    ("new balance 990", "new balance"),
    ("asics gel", "asics"),
    ("under armour curry", "under armour"),
];

/// Checked in table order, not text order
pub(crate) const NUMBER_WORDS: &[(&str, usize)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("ten", 10),
    ("twenty", 20),
    ("fifty", 50),
    ("hundred", 100),
];

// ============================================================================
// Classification cues
// ============================================================================

pub(crate) const SIMILARITY_CUES: &[&str] = &["similar to", "like this", "matching", "comparable"];

pub(crate) const ACTION_VERBS: &[&str] = &["find", "show", "search", "get", "look for"];

pub(crate) const HYBRID_CUES: &[&str] = &["and", "with", "that have"];

/// (cues, threshold), first group with a hit wins
pub(crate) const THRESHOLD_CUES: &[(&[&str], f32)] = &[
    (&["very similar", "exact match"], 0.9),
    (&["similar", "like"], 0.7),
    (&["somewhat similar", "related"], 0.5),
];

// ============================================================================
// Filter pattern groups
// ============================================================================

/// Metadata categories recognised in free text, in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Brand,
    Pattern,
    Shape,
    Size,
    Color,
    Style,
}

impl Category {
    pub(crate) const ALL: [Category; 6] = [
        Category::Brand,
        Category::Pattern,
        Category::Shape,
        Category::Size,
        Category::Color,
        Category::Style,
    ];

    /// Metadata key the extracted value filters on
    pub(crate) fn field(&self) -> &'static str {
        match self {
            Category::Brand => "brand",
            Category::Pattern => "pattern",
            Category::Shape => "shape",
            Category::Size => "size",
            Category::Color => "color",
            Category::Style => "style",
        }
    }

    /// Ordered patterns; capture group 1 carries the value
    pub(crate) fn patterns(&self) -> &'static [Regex] {
        match self {
            Category::Brand => &BRAND_PATTERNS,
            Category::Pattern => &PATTERN_PATTERNS,
            Category::Shape => &SHAPE_PATTERNS,
            Category::Size => &SIZE_PATTERNS,
            Category::Color => &COLOR_PATTERNS,
            Category::Style => &STYLE_PATTERNS,
        }
    }
}

static BRAND_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let aliases: Vec<&str> = BRAND_ALIASES.iter().map(|(alias, _)| *alias).collect();
    vec![
        compile(&format!(r"\b({})\b", aliases.join("|"))),
        compile(
            r"\b(nike|adidas|puma|converse|vans|reebok|new balance|asics|under armour|jordan)\b",
        ),
        compile(r"\b(\w+)\s+(?:shoes?|sneakers?|footwear)\b"),
    ]
});

static PATTERN_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![compile(r"\b(zigzag|circular|square|diamond|brand logo|logo)\b")]);

static SHAPE_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![compile(r"\b(round|square|oval|irregular|elongated)\b")]);

static SIZE_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![compile(r"\b(extra large|extra-large|xl|small|medium|large)\b")]);

static COLOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![compile(
        r"\b(red|blue|green|yellow|black|white|gray|grey|brown|pink|purple|orange)\b",
    )]
});

static STYLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"\b(athletic|running|basketball|tennis|casual|dress|formal|sport)\b"),
        compile(r"\b(sneakers?|shoes?|boots?|sandals?|flip flops?)\b"),
    ]
});

// ============================================================================
// Image path and limit
// ============================================================================

const IMAGE_EXT: &str = r"(?:jpg|jpeg|png|bmp|tiff)";

/// Anchored to "image"/"file" first, then any bare filename
pub(crate) static IMAGE_PATH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(&format!(r#"(?i)\bimage\s+([^\s"']+\.{})\b"#, IMAGE_EXT)),
        compile(&format!(r#"(?i)\bfile\s+([^\s"']+\.{})\b"#, IMAGE_EXT)),
        compile(&format!(r#"(?i)([^\s"']+\.{})\b"#, IMAGE_EXT)),
    ]
});

pub(crate) static LIMIT_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(\d+)\s+(?:results?|items?|shoes?)\b"));

// ============================================================================
// Phrase matching
// ============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `phrase` occurs in `text` as whole words
///
/// "like" matches "shoes like mine" but not "likely".
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
    })
}

pub(crate) fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        for category in Category::ALL {
            assert!(!category.patterns().is_empty(), "{:?}", category);
        }
        assert_eq!(IMAGE_PATH_PATTERNS.len(), 3);
        assert!(LIMIT_PATTERN.is_match("20 results"));
    }

    #[test]
    fn test_contains_phrase_word_boundaries() {
        assert!(contains_phrase("shoes like mine", "like"));
        assert!(!contains_phrase("likely shoes", "like"));
        assert!(contains_phrase("look for boots", "look for"));
        assert!(!contains_phrase("often", "ten"));
        assert!(contains_phrase("ten", "ten"));
        assert!(!contains_phrase("sandals", "and"));
    }

    #[test]
    fn test_size_prefers_longest_form() {
        let caps = SIZE_PATTERNS[0].captures("extra large boots").unwrap();
        assert_eq!(&caps[1], "extra large");
    }

    #[test]
    fn test_alias_pattern_precedes_brand() {
        let caps = BRAND_PATTERNS[0].captures("classic chuck taylor high tops").unwrap();
        assert_eq!(&caps[1], "chuck taylor");
    }
}
