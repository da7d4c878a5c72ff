//! Vector types
//!
//! Canonical definitions shared by the index engine and the search layer:
//! collection configuration, distance metrics, stored records, and the
//! metadata filter language.
//!
//! ## Filter semantics
//!
//! A [`MetadataFilter`] is a conjunction of per-field conditions. A record
//! matches only if every filtered field is present in its metadata and the
//! stored value satisfies the condition:
//!
//! - [`FilterValue::Eq`]: stored value equals the scalar
//! - [`FilterValue::In`]: stored value is a member of the list
//!
//! A record missing a filtered field never matches.

use crate::error::{TreadError, TreadResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata attached to a vector record (a JSON object)
pub type Metadata = serde_json::Map<String, Value>;

// ============================================================================
// DistanceMetric
// ============================================================================

/// Distance metric used to rank neighbours
///
/// Every metric is exposed as a similarity in `[0, 1]` where `1.0` means
/// identical, so scores from different backends are comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 / (1 + L2)`
    #[default]
    Euclidean,
    /// Cosine similarity clamped to `[0, 1]`
    Cosine,
}

impl DistanceMetric {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
        }
    }

    /// Parse from a configuration string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Some(DistanceMetric::Euclidean),
            "cosine" => Some(DistanceMetric::Cosine),
            _ => None,
        }
    }

    /// Serialization byte for the snapshot header
    pub fn to_byte(&self) -> u8 {
        match self {
            DistanceMetric::Euclidean => 0,
            DistanceMetric::Cosine => 1,
        }
    }

    /// Parse from the snapshot header byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DistanceMetric::Euclidean),
            1 => Some(DistanceMetric::Cosine),
            _ => None,
        }
    }
}

// ============================================================================
// VectorConfig
// ============================================================================

/// Immutable per-collection vector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Embedding dimension; every record in the collection has this length
    pub dimension: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
}

impl VectorConfig {
    /// Create a new config, rejecting a zero dimension
    pub fn new(dimension: usize, metric: DistanceMetric) -> TreadResult<Self> {
        if dimension == 0 {
            return Err(TreadError::Config(
                "vector dimension must be greater than zero".to_string(),
            ));
        }
        Ok(VectorConfig { dimension, metric })
    }

    /// CLIP ViT-B/32 image/text embeddings (512 dims, euclidean)
    pub fn for_clip() -> Self {
        VectorConfig {
            dimension: 512,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Check an embedding against the configured dimension
    pub fn check_dimension(&self, embedding: &[f32]) -> TreadResult<()> {
        if embedding.len() != self.dimension {
            return Err(TreadError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// VectorRecord
// ============================================================================

/// A stored vector with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Collection-unique, immutable id
    pub id: String,
    /// Embedding of length `VectorConfig::dimension`
    pub embedding: Vec<f32>,
    /// Attached metadata object
    pub metadata: Metadata,
    /// Tombstone bit; deleted records are skipped by search until rebuild
    pub deleted: bool,
}

// ============================================================================
// Filters
// ============================================================================

/// JSON scalar value for filtering
///
/// Only scalar values can be compared. Arrays and objects are rejected when
/// a filter is built from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsonScalar {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (stored as f64)
    Number(f64),
    /// String value
    String(String),
}

impl JsonScalar {
    /// Check if this scalar matches a JSON value
    pub fn matches_json(&self, value: &Value) -> bool {
        match (self, value) {
            (JsonScalar::Null, Value::Null) => true,
            (JsonScalar::Bool(a), Value::Bool(b)) => a == b,
            (JsonScalar::Number(a), Value::Number(b)) => {
                b.as_f64().is_some_and(|n| (a - n).abs() < f64::EPSILON)
            }
            (JsonScalar::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Convert a JSON value, returning `None` for arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(JsonScalar::Null),
            Value::Bool(b) => Some(JsonScalar::Bool(*b)),
            Value::Number(n) => n.as_f64().map(JsonScalar::Number),
            Value::String(s) => Some(JsonScalar::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            JsonScalar::Null => Value::Null,
            JsonScalar::Bool(b) => Value::Bool(*b),
            JsonScalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            JsonScalar::String(s) => Value::String(s.clone()),
        }
    }

    /// String content, if this is a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonScalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for JsonScalar {
    fn from(v: bool) -> Self {
        JsonScalar::Bool(v)
    }
}

impl From<i64> for JsonScalar {
    fn from(v: i64) -> Self {
        JsonScalar::Number(v as f64)
    }
}

impl From<f64> for JsonScalar {
    fn from(v: f64) -> Self {
        JsonScalar::Number(v)
    }
}

impl From<String> for JsonScalar {
    fn from(v: String) -> Self {
        JsonScalar::String(v)
    }
}

impl From<&str> for JsonScalar {
    fn from(v: &str) -> Self {
        JsonScalar::String(v.to_string())
    }
}

/// Condition on a single metadata field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    /// Stored value must equal the scalar
    Eq(JsonScalar),
    /// Stored value must be one of the scalars
    In(Vec<JsonScalar>),
}

impl FilterValue {
    /// Check a stored metadata value against this condition
    pub fn matches(&self, stored: &Value) -> bool {
        match self {
            FilterValue::Eq(expected) => expected.matches_json(stored),
            FilterValue::In(options) => options.iter().any(|o| o.matches_json(stored)),
        }
    }

    /// Build a condition from JSON: scalars become `Eq`, flat arrays `In`.
    ///
    /// Objects and nested arrays are a validation error.
    pub fn from_json(field: &str, value: &Value) -> TreadResult<Self> {
        match value {
            Value::Array(items) => {
                let mut options = Vec::with_capacity(items.len());
                for item in items {
                    let scalar = JsonScalar::from_json(item).ok_or_else(|| {
                        TreadError::validation(format!(
                            "filter '{}' list values must be scalars",
                            field
                        ))
                    })?;
                    options.push(scalar);
                }
                Ok(FilterValue::In(options))
            }
            Value::Object(_) => Err(TreadError::validation(format!(
                "filter '{}' must be a scalar or a list of scalars",
                field
            ))),
            other => JsonScalar::from_json(other)
                .map(FilterValue::Eq)
                .ok_or_else(|| {
                    TreadError::validation(format!("filter '{}' has an unsupported value", field))
                }),
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Eq(s) => s.to_json(),
            FilterValue::In(options) => Value::Array(options.iter().map(|o| o.to_json()).collect()),
        }
    }
}

impl From<JsonScalar> for FilterValue {
    fn from(v: JsonScalar) -> Self {
        FilterValue::Eq(v)
    }
}

/// Metadata filter for search
///
/// All conditions must match (AND semantics). Fields are kept sorted so
/// iteration and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, FilterValue>,
}

impl MetadataFilter {
    /// Create an empty filter (matches all)
    pub fn new() -> Self {
        MetadataFilter::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonScalar>) -> Self {
        self.conditions
            .insert(field.into(), FilterValue::Eq(value.into()));
        self
    }

    /// Add a membership condition
    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonScalar>,
    {
        self.conditions.insert(
            field.into(),
            FilterValue::In(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Set a condition, replacing any existing one on the same field
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.conditions.insert(field.into(), value);
    }

    /// Build from a JSON object of `field -> scalar | [scalar]`
    pub fn from_json_map(map: &Metadata) -> TreadResult<Self> {
        let mut filter = MetadataFilter::new();
        for (field, value) in map {
            filter.insert(field.clone(), FilterValue::from_json(field, value)?);
        }
        Ok(filter)
    }

    /// Render as a JSON object (inverse of [`from_json_map`](Self::from_json_map))
    pub fn to_json_map(&self) -> Metadata {
        self.conditions
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Check if metadata matches this filter
    ///
    /// Returns true if all conditions match. A missing field fails the match.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            metadata
                .get(field)
                .is_some_and(|stored| condition.matches(stored))
        })
    }

    /// Condition on a field, if any
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.conditions.get(field)
    }

    /// Iterate conditions in field order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.conditions.iter()
    }

    /// Check if filter is empty (matches all)
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Get the number of conditions in the filter
    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}
