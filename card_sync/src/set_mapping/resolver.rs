//! Set identity resolver
//!
//! Pairs every Catalog A set with at most one English Catalog B set by
//! running a fixed cascade of strategies; the first strategy that finds a
//! partner wins. Output depends only on input content and order.

use super::names::{clean_name, contains_either, normalize, shared_tokens};
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tcg_common::{
    CatalogASet, CatalogBSet, MappingArtifact, MappingMetadata, MatchType, SetMapping,
    UnmappedSets, ARTIFACT_VERSION,
};

/// Largest release date distance accepted by the name + date strategy
pub const MAX_DATE_DIFF_DAYS: i64 = 90;

/// Manual `catalogASetId -> catalogBSetId` pairs applied before the cascade
pub type Overrides = BTreeMap<String, u64>;

/// Catalog B set with its name forms precomputed
struct Candidate<'a> {
    set: &'a CatalogBSet,
    lowercase: String,
    normalized: String,
    cleaned: String,
}

impl<'a> Candidate<'a> {
    fn new(set: &'a CatalogBSet) -> Self {
        Self {
            set,
            lowercase: set.name.trim().to_lowercase(),
            normalized: normalize(&set.name),
            cleaned: clean_name(&set.name),
        }
    }
}

struct Match<'a> {
    set: &'a CatalogBSet,
    match_type: MatchType,
    date_diff_days: Option<i64>,
}

pub struct SetResolver {
    max_date_diff_days: i64,
}

impl Default for SetResolver {
    fn default() -> Self {
        Self {
            max_date_diff_days: MAX_DATE_DIFF_DAYS,
        }
    }
}

impl SetResolver {
    pub fn new(max_date_diff_days: i64) -> Self {
        Self { max_date_diff_days }
    }

    pub fn resolve(
        &self,
        catalog_a: &[CatalogASet],
        catalog_b: &[CatalogBSet],
        overrides: &Overrides,
    ) -> SyncResult<MappingArtifact> {
        self.resolve_at(catalog_a, catalog_b, overrides, Utc::now())
    }

    /// Resolve with a fixed generation timestamp
    pub fn resolve_at(
        &self,
        catalog_a: &[CatalogASet],
        catalog_b: &[CatalogBSet],
        overrides: &Overrides,
        generated_at: DateTime<Utc>,
    ) -> SyncResult<MappingArtifact> {
        check_unique_ids(catalog_a)?;

        let english: Vec<Candidate> = catalog_b
            .iter()
            .filter(|set| set.is_english())
            .map(Candidate::new)
            .collect();
        log::info!(
            "Resolving {} Catalog A sets against {} English Catalog B sets ({} total)",
            catalog_a.len(),
            english.len(),
            catalog_b.len()
        );

        let mut mappings = apply_overrides(catalog_a, catalog_b, overrides)?;
        let mut unmapped_a = Vec::new();

        for set in catalog_a {
            if mappings.contains_key(&set.id) {
                continue;
            }
            match self.find_match(set, &english) {
                Some(found) => {
                    log::debug!(
                        "Mapped {} -> {} ({})",
                        set.id,
                        found.set.id,
                        found.match_type.as_str()
                    );
                    mappings.insert(
                        set.id.clone(),
                        SetMapping {
                            catalog_a_set_id: set.id.clone(),
                            catalog_b_set_id: found.set.id,
                            catalog_b_code: found.set.code.clone(),
                            match_type: found.match_type,
                            date_diff_days: found.date_diff_days,
                        },
                    );
                }
                None => {
                    log::debug!("No Catalog B partner for {} ({})", set.id, set.name);
                    unmapped_a.push(set.clone());
                }
            }
        }

        let claimed: HashSet<u64> = mappings.values().map(|m| m.catalog_b_set_id).collect();
        let unmapped_b: Vec<CatalogBSet> = english
            .iter()
            .filter(|candidate| !claimed.contains(&candidate.set.id))
            .map(|candidate| candidate.set.clone())
            .collect();

        log_summary(&mappings, unmapped_a.len(), unmapped_b.len());

        Ok(MappingArtifact {
            metadata: MappingMetadata {
                version: ARTIFACT_VERSION,
                generated_at,
                total_mappings: mappings.len(),
                unmapped_a: unmapped_a.len(),
                unmapped_b: unmapped_b.len(),
            },
            mappings,
            unmapped: UnmappedSets {
                catalog_a: unmapped_a,
                catalog_b: unmapped_b,
            },
        })
    }

    fn find_match<'a>(&self, set: &CatalogASet, english: &[Candidate<'a>]) -> Option<Match<'a>> {
        by_cross_ref_code(set, english)
            .or_else(|| by_exact_name(set, english))
            .or_else(|| self.by_name_and_date(set, english))
            .or_else(|| by_cleaned_name(set, english))
    }

    fn by_name_and_date<'a>(
        &self,
        set: &CatalogASet,
        english: &[Candidate<'a>],
    ) -> Option<Match<'a>> {
        let name = normalize(&set.name);
        if name.is_empty() {
            return None;
        }

        // min_by_key keeps the first of equal deltas
        let (candidate, diff) = english
            .iter()
            .filter(|c| {
                contains_either(&name, &c.normalized) || shared_tokens(&name, &c.normalized) >= 2
            })
            .map(|c| (c, (set.release_date - c.set.release_date).num_days().abs()))
            .min_by_key(|(_, diff)| *diff)?;

        if diff > self.max_date_diff_days {
            log::debug!(
                "Closest name candidate for {} is {} days apart, rejecting",
                set.id,
                diff
            );
            return None;
        }

        Some(Match {
            set: candidate.set,
            match_type: MatchType::NameDateSimilarity,
            date_diff_days: Some(diff),
        })
    }
}

fn by_cross_ref_code<'a>(set: &CatalogASet, english: &[Candidate<'a>]) -> Option<Match<'a>> {
    let code = set.cross_ref_code.as_deref()?;
    english
        .iter()
        .find(|c| c.set.code.as_deref() == Some(code))
        .map(|c| Match {
            set: c.set,
            match_type: MatchType::CrossrefCode,
            date_diff_days: None,
        })
}

fn by_exact_name<'a>(set: &CatalogASet, english: &[Candidate<'a>]) -> Option<Match<'a>> {
    let name = set.name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    english.iter().find(|c| c.lowercase == name).map(|c| Match {
        set: c.set,
        match_type: MatchType::ExactName,
        date_diff_days: None,
    })
}

fn by_cleaned_name<'a>(set: &CatalogASet, english: &[Candidate<'a>]) -> Option<Match<'a>> {
    let cleaned = clean_name(&set.name);
    if cleaned.is_empty() {
        return None;
    }
    english.iter().find(|c| c.cleaned == cleaned).map(|c| Match {
        set: c.set,
        match_type: MatchType::CleanedName,
        date_diff_days: None,
    })
}

fn check_unique_ids(catalog_a: &[CatalogASet]) -> SyncResult<()> {
    let mut seen = HashSet::new();
    for set in catalog_a {
        if !seen.insert(set.id.as_str()) {
            return Err(SyncError::InvalidCatalog(format!(
                "duplicate Catalog A set id {}",
                set.id
            )));
        }
    }
    Ok(())
}

fn apply_overrides(
    catalog_a: &[CatalogASet],
    catalog_b: &[CatalogBSet],
    overrides: &Overrides,
) -> SyncResult<BTreeMap<String, SetMapping>> {
    let known_a: BTreeSet<&str> = catalog_a.iter().map(|set| set.id.as_str()).collect();
    let mut mappings = BTreeMap::new();

    for (a_id, b_id) in overrides {
        if !known_a.contains(a_id.as_str()) {
            return Err(SyncError::InvalidCatalog(format!(
                "override names unknown Catalog A set {}",
                a_id
            )));
        }
        let b_set = catalog_b.iter().find(|set| set.id == *b_id).ok_or_else(|| {
            SyncError::InvalidCatalog(format!("override names unknown Catalog B set {}", b_id))
        })?;

        mappings.insert(
            a_id.clone(),
            SetMapping {
                catalog_a_set_id: a_id.clone(),
                catalog_b_set_id: b_set.id,
                catalog_b_code: b_set.code.clone(),
                match_type: MatchType::Manual,
                date_diff_days: None,
            },
        );
    }

    if !mappings.is_empty() {
        log::info!("Applied {} manual overrides", mappings.len());
    }
    Ok(mappings)
}

fn log_summary(mappings: &BTreeMap<String, SetMapping>, unmapped_a: usize, unmapped_b: usize) {
    let mut counts: BTreeMap<MatchType, usize> = BTreeMap::new();
    for mapping in mappings.values() {
        *counts.entry(mapping.match_type).or_default() += 1;
    }

    log::info!("Mapped {} sets:", mappings.len());
    for (match_type, count) in &counts {
        log::info!("  {:<22} {}", match_type.as_str(), count);
    }
    log::info!(
        "Unmapped: {} Catalog A sets, {} English Catalog B sets",
        unmapped_a,
        unmapped_b
    );
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
