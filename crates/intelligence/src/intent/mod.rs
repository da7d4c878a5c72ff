//! Query intent extraction
//!
//! Turns free text into a [`QueryIntent`]: search terms, metadata filters,
//! query type, image path, similarity threshold and result limit.
//!
//! # Pipeline
//!
//! ```text
//! raw text ──► normalize ──► terms (stop words, synonyms)
//!                 │
//!                 ├──► filters (brand, pattern, shape, size, color, style)
//!                 ├──► query type (first matching rule)
//!                 └──► threshold, limit
//! raw text ──► image path (case preserved)
//! ```
//!
//! Extraction never fails: any internal error degrades to
//! [`QueryIntent::fallback`], a low-confidence plain text intent.

pub mod normalize;
pub(crate) mod patterns;
pub mod validate;

use tracing::{debug, warn};
use tread_core::{
    CategoryRegistry, MetadataFilter, QueryIntent, QueryType, TreadError, TreadResult,
    DEFAULT_LIMIT, DEFAULT_THRESHOLD,
};

use normalize::{extract_terms, normalize, synonym_substitutions};
use patterns::{
    contains_any, contains_phrase, Category, ACTION_VERBS, BRAND_ALIASES, HYBRID_CUES,
    IMAGE_PATH_PATTERNS, LIMIT_PATTERN, NUMBER_WORDS, SIMILARITY_CUES, THRESHOLD_CUES,
};
pub use validate::{validate_query, QueryRejection, MAX_QUERY_CHARS, MIN_QUERY_CHARS};

/// Confidence of an intent that found nothing to act on but terms
const TERMS_ONLY_CONFIDENCE: f32 = 0.6;

/// Rule-based extractor over a category registry
#[derive(Debug, Clone, Default)]
pub struct QueryIntentExtractor {
    categories: CategoryRegistry,
}

impl QueryIntentExtractor {
    pub fn new(categories: CategoryRegistry) -> Self {
        QueryIntentExtractor { categories }
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    /// Standalone validation, see [`validate_query`]
    pub fn validate(&self, text: &str) -> Result<(), QueryRejection> {
        validate_query(text)
    }

    /// Validate, then extract
    ///
    /// # Errors
    ///
    /// `Validation` when the query is refused.
    pub fn parse(&self, text: &str) -> TreadResult<QueryIntent> {
        if let Err(rejection) = validate_query(text) {
            debug!(target: "tread::intent", reason = %rejection, "Query rejected");
            return Err(rejection.into());
        }
        Ok(self.extract(text))
    }

    /// Extract an intent; degrades to a fallback intent instead of failing
    pub fn extract(&self, text: &str) -> QueryIntent {
        match self.try_extract(text) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(target: "tread::intent", error = %e, "Intent extraction degraded to text");
                QueryIntent::fallback(text)
            }
        }
    }

    fn try_extract(&self, text: &str) -> TreadResult<QueryIntent> {
        let normalized = normalize(text);
        let terms = extract_terms(&normalized);
        let filters = self.extract_filters(&normalized);
        let query_type = classify(&normalized, &filters);
        let image_path = extract_image_path(text);
        let limit = extract_limit(&normalized)?;

        let confidence = if filters.is_empty() && image_path.is_none() {
            TERMS_ONLY_CONFIDENCE
        } else {
            1.0
        };

        let mut builder = QueryIntent::builder(query_type)
            .terms(terms)
            .filters(filters)
            .threshold(extract_threshold(&normalized))
            .limit(limit)
            .confidence(confidence);
        if let Some(path) = image_path {
            builder = builder.image_path(path);
        }
        let intent = builder.build()?;

        debug!(
            target: "tread::intent",
            query_type = intent.query_type().as_str(),
            terms = intent.search_terms().len(),
            filters = intent.filters().len(),
            limit = intent.limit(),
            "Extracted intent"
        );
        Ok(intent)
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// First capture per category, normalized and checked against the registry
    pub fn extract_filters(&self, normalized: &str) -> MetadataFilter {
        let mut filters = MetadataFilter::new();
        for category in Category::ALL {
            let raw = match first_capture(category, normalized) {
                Some(raw) => raw,
                None => continue,
            };
            if let Some(value) = self.resolve(category, &raw) {
                filters = filters.eq(category.field(), value);
            }
        }
        filters
    }

    fn resolve(&self, category: Category, raw: &str) -> Option<String> {
        let raw = raw.to_lowercase();
        match category {
            Category::Brand => {
                let brand = self.normalize_brand(&raw);
                self.categories.is_brand(&brand).then_some(brand)
            }
            Category::Pattern => {
                let pattern = if raw == "logo" {
                    "brand_logo".to_string()
                } else {
                    catalog_key(&raw)
                };
                self.categories.is_pattern(&pattern).then_some(pattern)
            }
            Category::Shape => self.categories.is_shape(&raw).then_some(raw),
            Category::Size => {
                let size = self.normalize_size(&raw);
                self.categories.is_size(&size).then_some(size)
            }
            Category::Color | Category::Style => Some(raw),
        }
    }

    /// Alias table first, then the registry, else "other"
    fn normalize_brand(&self, raw: &str) -> String {
        let resolved = match BRAND_ALIASES.iter().find(|(alias, _)| raw.contains(alias)) {
            Some((_, canonical)) => *canonical,
            None => raw,
        };
        let key = catalog_key(resolved);
        if self.categories.is_brand(&key) {
            key
        } else {
            "other".to_string()
        }
    }

    fn normalize_size(&self, raw: &str) -> String {
        match raw {
            "xl" | "extra large" | "extra-large" => "extra_large".to_string(),
            _ if self.categories.is_size(raw) => raw.to_string(),
            _ => "medium".to_string(),
        }
    }

    // ========================================================================
    // Variations
    // ========================================================================

    /// Alternative phrasings of a query
    ///
    /// The query itself, synonym substitutions, a `?` variant, and
    /// "find"/"show me" prefixes when the query starts with no action verb.
    /// Deduplicated in generation order.
    pub fn generate_query_variations(&self, query: &str) -> Vec<String> {
        let mut variations = vec![query.to_string()];
        variations.extend(synonym_substitutions(query));
        if !query.ends_with('?') {
            variations.push(format!("{}?", query));
        }
        let lowered = query.to_lowercase();
        if !["find", "show", "search", "get"]
            .iter()
            .any(|verb| lowered.starts_with(verb))
        {
            variations.push(format!("find {}", query));
            variations.push(format!("show me {}", query));
        }

        let mut unique: Vec<String> = Vec::with_capacity(variations.len());
        for v in variations {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        unique
    }
}

/// Registry keys use underscores: "new balance" -> "new_balance"
fn catalog_key(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("_")
}

fn first_capture(category: Category, text: &str) -> Option<String> {
    category
        .patterns()
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// Classification
// ============================================================================

/// Query type by the first matching rule
///
/// 1. similarity cue -> image
/// 2. no action verb, some filter -> metadata
/// 3. more than two filters, or a conjunction cue -> hybrid
/// 4. text
pub fn classify(normalized: &str, filters: &MetadataFilter) -> QueryType {
    if contains_any(normalized, SIMILARITY_CUES) {
        return QueryType::Image;
    }
    if !contains_any(normalized, ACTION_VERBS) && !filters.is_empty() {
        return QueryType::Metadata;
    }
    if filters.len() > 2 || contains_any(normalized, HYBRID_CUES) {
        return QueryType::Hybrid;
    }
    QueryType::Text
}

/// First image filename in the raw text, "image <path>" and "file <path>"
/// forms preferred over a bare filename
pub fn extract_image_path(text: &str) -> Option<String> {
    IMAGE_PATH_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_threshold(normalized: &str) -> f32 {
    THRESHOLD_CUES
        .iter()
        .find(|(cues, _)| contains_any(normalized, cues))
        .map(|(_, threshold)| *threshold)
        .unwrap_or(DEFAULT_THRESHOLD)
}

/// Number word from the fixed table, else "<n> results|items|shoes"
pub fn extract_limit(normalized: &str) -> TreadResult<usize> {
    if let Some((_, n)) = NUMBER_WORDS
        .iter()
        .find(|(word, _)| contains_phrase(normalized, word))
    {
        return Ok(*n);
    }
    match LIMIT_PATTERN.captures(normalized).and_then(|c| c.get(1)) {
        Some(digits) => digits.as_str().parse::<usize>().map_err(|e| {
            TreadError::validation(format!("limit '{}' out of range: {}", digits.as_str(), e))
        }),
        None => Ok(DEFAULT_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tread_core::{FilterValue, JsonScalar};

    fn extractor() -> QueryIntentExtractor {
        QueryIntentExtractor::default()
    }

    fn filter_str<'a>(intent: &'a QueryIntent, field: &str) -> Option<&'a str> {
        match intent.filters().get(field) {
            Some(FilterValue::Eq(JsonScalar::String(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_brand_extraction() {
        let intent = extractor().extract("Find Nike shoes");
        assert_eq!(filter_str(&intent, "brand"), Some("nike"));
        assert_eq!(intent.query_type(), QueryType::Text);
    }

    #[test]
    fn test_pattern_extraction() {
        let intent = extractor().extract("Show zigzag pattern shoes");
        assert_eq!(filter_str(&intent, "pattern"), Some("zigzag"));
    }

    #[test]
    fn test_brand_alias_and_multiword_brand() {
        let e = extractor();
        let intent = e.extract("find chuck taylor high tops");
        assert_eq!(filter_str(&intent, "brand"), Some("converse"));

        let intent = e.extract("find new balance trainers");
        assert_eq!(filter_str(&intent, "brand"), Some("new_balance"));
    }

    #[test]
    fn test_unknown_brand_falls_back_to_other() {
        let intent = extractor().extract("find fancy shoes");
        assert_eq!(filter_str(&intent, "brand"), Some("other"));
    }

    #[test]
    fn test_size_normalization() {
        let e = extractor();
        assert_eq!(filter_str(&e.extract("find xl boots"), "size"), Some("extra_large"));
        assert_eq!(
            filter_str(&e.extract("find extra large boots"), "size"),
            Some("extra_large")
        );
        assert_eq!(filter_str(&e.extract("find small boots"), "size"), Some("small"));
        assert_eq!(e.normalize_size("huge"), "medium");
    }

    #[test]
    fn test_color_and_style_pass_through() {
        let intent = extractor().extract("find grey casual boots");
        assert_eq!(filter_str(&intent, "color"), Some("grey"));
        assert_eq!(filter_str(&intent, "style"), Some("casual"));
    }

    #[test]
    fn test_pattern_logo_maps_to_brand_logo() {
        let intent = extractor().extract("find boots with a logo tread");
        assert_eq!(filter_str(&intent, "pattern"), Some("brand_logo"));
    }

    #[test]
    fn test_registry_controls_validated_categories() {
        let mut categories = CategoryRegistry::default();
        categories.shapes.retain(|s| s != "oval");
        let e = QueryIntentExtractor::new(categories);
        assert_eq!(filter_str(&e.extract("find oval sole"), "shape"), None);
        assert_eq!(
            filter_str(&extractor().extract("find oval sole"), "shape"),
            Some("oval")
        );
    }

    #[test]
    fn test_classification_rule_order() {
        let e = extractor();
        // similarity cue beats everything
        assert_eq!(
            e.extract("find red nike shoes similar to this").query_type(),
            QueryType::Image
        );
        // no action verb but filters
        assert_eq!(e.extract("red nike shoes").query_type(), QueryType::Metadata);
        // conjunction cue
        assert_eq!(e.extract("find boots and sandals").query_type(), QueryType::Hybrid);
        // more than two filters
        assert_eq!(
            e.extract("show red nike running shoes").query_type(),
            QueryType::Hybrid
        );
        assert_eq!(e.extract("search something comfy").query_type(), QueryType::Text);
    }

    #[test]
    fn test_cues_match_whole_words() {
        // "sandals" contains "and", "getaway" contains "get"
        assert_eq!(classify("sandals", &MetadataFilter::new()), QueryType::Text);
        let filters = MetadataFilter::new().eq("color", "red");
        assert_eq!(classify("getaway red", &filters), QueryType::Metadata);
    }

    #[test]
    fn test_limit_extraction() {
        let e = extractor();
        assert_eq!(e.extract("show me 20 results").limit(), 20);
        assert_eq!(e.extract("some query").limit(), 10);
        assert_eq!(e.extract("show me five boots").limit(), 5);
        // table order, not text order
        assert_eq!(e.extract("ten results or two").limit(), 2);
        // no substring hits
        assert_eq!(e.extract("often worn").limit(), 10);
    }

    #[test]
    fn test_threshold_extraction() {
        assert_eq!(extract_threshold("very similar boots"), 0.9);
        assert_eq!(extract_threshold("an exact match"), 0.9);
        assert_eq!(extract_threshold("shoes like mine"), 0.7);
        assert_eq!(extract_threshold("related styles"), 0.5);
        assert_eq!(extract_threshold("boots"), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_image_path_extraction() {
        assert_eq!(
            extract_image_path("shoes like image Uploads/Sole_01.JPG please"),
            Some("Uploads/Sole_01.JPG".to_string())
        );
        assert_eq!(
            extract_image_path("a.png vs file b.jpeg"),
            Some("b.jpeg".to_string())
        );
        assert_eq!(extract_image_path("match ref.tiff"), Some("ref.tiff".to_string()));
        assert_eq!(extract_image_path("no picture here"), None);

        let intent = extractor().extract("shoes similar to image Ref.PNG");
        assert_eq!(intent.image_path(), Some("Ref.PNG"));
        assert_eq!(intent.query_type(), QueryType::Image);
    }

    #[test]
    fn test_terms_are_deduplicated() {
        let intent = extractor().extract("shoes shoes sneakers");
        let terms = intent.search_terms();
        let mut sorted = terms.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), terms.len());
        assert!(terms.contains(&"shoe".to_string()));
    }

    #[test]
    fn test_out_of_range_limit_degrades_to_fallback() {
        let text = "show 99999999999999999999999 results";
        let intent = extractor().extract(text);
        assert_eq!(intent, QueryIntent::fallback(text));
        assert_eq!(intent.query_type(), QueryType::Text);
        assert_eq!(intent.search_terms(), &[text.to_string()]);
        assert!(intent.filters().is_empty());
    }

    #[test]
    fn test_zero_limit_degrades_to_fallback() {
        let intent = extractor().extract("show 0 results");
        assert_eq!(intent.limit(), DEFAULT_LIMIT);
        assert!(intent.confidence() < 0.5);
    }

    #[test]
    fn test_parse_validates_first() {
        let e = extractor();
        assert!(e.parse(&"x".repeat(501)).unwrap_err().is_validation_error());
        assert!(e
            .parse("<script>alert(1)</script>")
            .unwrap_err()
            .is_validation_error());
        assert_eq!(e.validate("x"), Err(QueryRejection::TooShort));
        assert!(e.parse("find nike shoes").is_ok());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let e = extractor();
        let q = "Show me three red Nike running shoes with a zigzag tread";
        assert_eq!(e.extract(q), e.extract(q));
    }

    #[test]
    fn test_query_variations() {
        let vars = extractor().generate_query_variations("red shoe");
        assert_eq!(vars[0], "red shoe");
        assert!(vars.contains(&"crimson shoe".to_string()));
        assert!(vars.contains(&"red shoe?".to_string()));
        assert!(vars.contains(&"find red shoe".to_string()));
        assert!(vars.contains(&"show me red shoe".to_string()));

        let vars = extractor().generate_query_variations("find boots?");
        assert_eq!(vars, vec!["find boots?".to_string()]);
    }
}
