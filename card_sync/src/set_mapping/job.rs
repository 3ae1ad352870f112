//! Offline set mapping job: load catalogs, resolve, write the artifact
//!
//! Any input problem aborts the job before anything is written.

use super::resolver::{Overrides, SetResolver};
use crate::api::{CatalogAApi, CatalogBApi, PokeDataSet, TcgSet};
use crate::error::{SyncError, SyncResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tcg_common::{CatalogASet, CatalogBSet, MappingArtifact};

/// Raw Catalog A dumps come either as the API envelope or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogADump {
    Envelope { data: Vec<TcgSet> },
    Bare(Vec<TcgSet>),
}

/// Read a Catalog A `/sets` dump
pub fn read_catalog_a(path: &Path) -> SyncResult<Vec<CatalogASet>> {
    let content = fs::read_to_string(path)?;
    let dump: CatalogADump = serde_json::from_str(&content)?;
    let sets = match dump {
        CatalogADump::Envelope { data } => data,
        CatalogADump::Bare(sets) => sets,
    };
    log::info!("Read {} Catalog A sets from {}", sets.len(), path.display());
    convert_catalog_a(sets)
}

/// Read a Catalog B `/sets` dump
pub fn read_catalog_b(path: &Path) -> SyncResult<Vec<CatalogBSet>> {
    let content = fs::read_to_string(path)?;
    let sets: Vec<PokeDataSet> = serde_json::from_str(&content)?;
    log::info!("Read {} Catalog B sets from {}", sets.len(), path.display());
    convert_catalog_b(sets)
}

/// Read a manual override table (`{"sv1": 1, ...}`)
pub fn read_overrides(path: &Path) -> SyncResult<Overrides> {
    let content = fs::read_to_string(path)?;
    let overrides: Overrides = serde_json::from_str(&content)?;
    log::info!("Read {} manual overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}

pub async fn fetch_catalog_a(api: &dyn CatalogAApi) -> SyncResult<Vec<CatalogASet>> {
    convert_catalog_a(api.list_sets().await?)
}

/// Every Catalog B set; the resolver does the language filtering
pub async fn fetch_catalog_b(api: &dyn CatalogBApi) -> SyncResult<Vec<CatalogBSet>> {
    convert_catalog_b(api.list_sets(None).await?)
}

fn convert_catalog_a(sets: Vec<TcgSet>) -> SyncResult<Vec<CatalogASet>> {
    sets.into_iter()
        .map(|set| {
            let id = set.id.clone();
            set.into_catalog_set().map_err(|e| {
                SyncError::InvalidCatalog(format!("Catalog A set {}: {}", id, e))
            })
        })
        .collect()
}

fn convert_catalog_b(sets: Vec<PokeDataSet>) -> SyncResult<Vec<CatalogBSet>> {
    sets.into_iter()
        .map(|set| {
            let id = set.id;
            set.into_catalog_set().map_err(|e| {
                SyncError::InvalidCatalog(format!("Catalog B set {}: {}", id, e))
            })
        })
        .collect()
}

/// Write the artifact next to its destination, then rename over it
pub fn write_artifact(path: &Path, artifact: &MappingArtifact) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    let json = artifact.to_json_pretty()?;
    let tmp = temp_path(path);
    fs::write(&tmp, json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    log::info!(
        "Wrote {} mappings to {}",
        artifact.metadata.total_mappings,
        path.display()
    );
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Resolve and persist in one step
pub fn build_mappings(
    resolver: &SetResolver,
    catalog_a: &[CatalogASet],
    catalog_b: &[CatalogBSet],
    overrides: &Overrides,
    output: &Path,
) -> SyncResult<MappingArtifact> {
    let artifact = resolver.resolve(catalog_a, catalog_b, overrides)?;
    write_artifact(output, &artifact)?;
    Ok(artifact)
}
