//! Query expansion for semantic search
//!
//! A [`QueryExpander`] turns one query into several phrasings. Semantic
//! search embeds each phrasing, searches with it, and boosts items that
//! several phrasings agree on.

use tread_core::TreadResult;

use crate::intent::normalize::synonym_substitutions;

/// Trait for query expansion implementations
///
/// Object-safe for use as `Arc<dyn QueryExpander>`.
pub trait QueryExpander: Send + Sync {
    /// The original query first, then its variants, without duplicates
    fn expand(&self, query: &str) -> TreadResult<Vec<String>>;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// Synonym-table expander
///
/// Swaps one word at a time for a related word. At most `max_expansions`
/// variants are produced besides the original query.
#[derive(Debug, Clone)]
pub struct SynonymExpander {
    max_expansions: usize,
}

impl SynonymExpander {
    pub fn new(max_expansions: usize) -> Self {
        SynonymExpander { max_expansions }
    }

    pub fn max_expansions(&self) -> usize {
        self.max_expansions
    }
}

impl QueryExpander for SynonymExpander {
    fn expand(&self, query: &str) -> TreadResult<Vec<String>> {
        let query = query.trim();
        let mut out = vec![query.to_string()];
        for variant in synonym_substitutions(query) {
            if out.len() > self.max_expansions {
                break;
            }
            if !out.contains(&variant) {
                out.push(variant);
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "synonym"
    }
}
