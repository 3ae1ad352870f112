//! Set mapping artifact produced by the offline set mapping job
//!
//! Persisted as a single JSON document. `mappings` is a `BTreeMap` so the
//! serialized form is stable for identical input.

use crate::sets::{CatalogASet, CatalogBSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current artifact format version
pub const ARTIFACT_VERSION: u32 = 1;

/// Which matching strategy produced a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    CrossrefCode,
    ExactName,
    NameDateSimilarity,
    CleanedName,
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::CrossrefCode => "crossref_code",
            MatchType::ExactName => "exact_name",
            MatchType::NameDateSimilarity => "name_date_similarity",
            MatchType::CleanedName => "cleaned_name",
            MatchType::Manual => "manual",
        }
    }
}

/// One Catalog A set paired with one Catalog B set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMapping {
    pub catalog_a_set_id: String,
    pub catalog_b_set_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_b_code: Option<String>,
    pub match_type: MatchType,
    /// Release date distance, recorded by the name + date strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_diff_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMetadata {
    #[serde(default = "default_version")]
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub total_mappings: usize,
    pub unmapped_a: usize,
    pub unmapped_b: usize,
}

fn default_version() -> u32 {
    ARTIFACT_VERSION
}

impl Default for MappingMetadata {
    fn default() -> Self {
        Self {
            version: ARTIFACT_VERSION,
            generated_at: DateTime::<Utc>::default(),
            total_mappings: 0,
            unmapped_a: 0,
            unmapped_b: 0,
        }
    }
}

/// Sets left over after every strategy ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedSets {
    #[serde(default)]
    pub catalog_a: Vec<CatalogASet>,
    #[serde(default)]
    pub catalog_b: Vec<CatalogBSet>,
}

/// The persisted result of a set mapping run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingArtifact {
    pub metadata: MappingMetadata,
    #[serde(default)]
    pub mappings: BTreeMap<String, SetMapping>,
    #[serde(default)]
    pub unmapped: UnmappedSets,
}

impl MappingArtifact {
    /// An artifact with no mappings, used when nothing could be loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn get(&self, catalog_a_set_id: &str) -> Option<&SetMapping> {
        self.mappings.get(catalog_a_set_id)
    }
}
