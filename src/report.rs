use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.0";

/// How well one scheme covers an observed verse inventory.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchemeScore {
    pub name: String,
    /// Observed chapters the scheme does not have, as `Book chapter`.
    pub missing_chapters: Vec<String>,
    /// Observed verses absent from an existing chapter.
    pub missing_verses: Vec<String>,
    /// Total scheme size, possibly limited to the observed books.
    pub verse_count: usize,
}

impl SchemeScore {
    pub fn covers_all(&self) -> bool {
        self.missing_chapters.is_empty() && self.missing_verses.is_empty()
    }
}

/// Detection run output
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DetectReport {
    pub schema_version: String,
    pub generated_at: String,
    /// Distinct observed references.
    pub observed_verses: usize,
    pub best: SchemeScore,
    pub runners_up: Vec<SchemeScore>,
}

/// Comparison output; exactly one of `schemes`/`mappings` is set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CompareReport {
    pub schema_version: String,
    pub generated_at: String,
    pub left: String,
    pub right: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemes: Option<SchemeComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings: Option<MappingComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchemeComparison {
    pub left_verses: usize,
    pub right_verses: usize,
    pub common_verses: usize,
    pub relation: SchemeRelation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SchemeRelation {
    SameOrder,
    SameVerses,
    RightSubsetOfLeft,
    LeftSubsetOfRight,
    Overlapping,
    Disjoint,
}

/// Per-verse classification counts for two mappings over the same
/// scheme pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MappingComparison {
    pub compared_verses: usize,
    pub both_unmapped: usize,
    pub left_unmapped: usize,
    pub right_unmapped: usize,
    pub same_single_verse: usize,
    pub same_order: usize,
    pub same_verses: usize,
    pub left_subset: usize,
    pub right_subset: usize,
    pub intersecting: usize,
    pub disjoint: usize,
}

/// Registry self-check output
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VerifyReport {
    pub schema_version: String,
    pub generated_at: String,
    pub versifications: usize,
    pub mappings: usize,
    pub round_trip_failures: Vec<String>,
    pub mapping_failures: Vec<String>,
    pub closure: ClosureHealth,
    /// SHA-256 of the canonical save form.
    pub canonical_sha256: String,
    /// Whether save -> load -> save reproduces the same bytes.
    pub save_load_deterministic: bool,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.round_trip_failures.is_empty()
            && self.mapping_failures.is_empty()
            && self.save_load_deterministic
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClosureHealth {
    pub known_pairs: usize,
    pub ambiguous_pairs: usize,
    pub unknown_pairs: usize,
}
