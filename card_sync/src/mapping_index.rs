//! Reverse lookup over the set mapping artifact
//!
//! The artifact maps Catalog A set ids to Catalog B set ids. Card
//! enrichment for Catalog B cards needs the opposite direction, so the index
//! inverts the mappings once per loaded artifact.
//!
//! If several Catalog A sets claim the same Catalog B set, the inversion
//! keeps the last one in the artifact's sorted key order (the greatest
//! Catalog A id). Such collisions are reported through [`MappingIndex::collisions`].

use crate::error::SyncResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tcg_common::{
    CardSource, CatalogASet, CatalogBSet, MappingArtifact, MappingMetadata, SetMapping,
};

/// Where the mapping artifact comes from
pub trait ArtifactLoader: Send + Sync {
    fn load(&self) -> SyncResult<MappingArtifact>;
}

/// Loads the artifact from the JSON file written by the mapping job
pub struct FileArtifactLoader {
    path: PathBuf,
}

impl FileArtifactLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactLoader for FileArtifactLoader {
    fn load(&self) -> SyncResult<MappingArtifact> {
        let content = fs::read_to_string(&self.path)?;
        let artifact = MappingArtifact::from_json(&content)?;
        log::info!(
            "Loaded {} set mappings from {}",
            artifact.mappings.len(),
            self.path.display()
        );
        Ok(artifact)
    }
}

/// Serves an artifact already in memory
pub struct StaticArtifactLoader(pub MappingArtifact);

impl ArtifactLoader for StaticArtifactLoader {
    fn load(&self) -> SyncResult<MappingArtifact> {
        Ok(self.0.clone())
    }
}

/// Unmapped sets of one catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UnmappedList {
    CatalogA(Vec<CatalogASet>),
    CatalogB(Vec<CatalogBSet>),
}

impl UnmappedList {
    pub fn len(&self) -> usize {
        match self {
            UnmappedList::CatalogA(sets) => sets.len(),
            UnmappedList::CatalogB(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LoadedIndex {
    artifact: MappingArtifact,
    reverse: HashMap<u64, String>,
    collisions: BTreeMap<u64, Vec<String>>,
}

impl LoadedIndex {
    fn build(artifact: MappingArtifact) -> Self {
        let mut reverse = HashMap::with_capacity(artifact.mappings.len());
        let mut claims: BTreeMap<u64, Vec<String>> = BTreeMap::new();

        // BTreeMap iteration is sorted, so the last insert wins deterministically
        for (a_set_id, mapping) in &artifact.mappings {
            reverse.insert(mapping.catalog_b_set_id, a_set_id.clone());
            claims
                .entry(mapping.catalog_b_set_id)
                .or_default()
                .push(a_set_id.clone());
        }

        let collisions: BTreeMap<u64, Vec<String>> = claims
            .into_iter()
            .filter(|(_, a_sets)| a_sets.len() > 1)
            .collect();
        for (b_set_id, a_sets) in &collisions {
            log::warn!(
                "Catalog B set {} is mapped from {} Catalog A sets ({}); using {}",
                b_set_id,
                a_sets.len(),
                a_sets.join(", "),
                reverse.get(b_set_id).map(String::as_str).unwrap_or("?")
            );
        }

        Self {
            artifact,
            reverse,
            collisions,
        }
    }
}

/// Lazily built, reloadable view of the mapping artifact
pub struct MappingIndex {
    loader: Box<dyn ArtifactLoader>,
    state: RwLock<Option<Arc<LoadedIndex>>>,
    generation: AtomicU64,
}

impl MappingIndex {
    pub fn new(loader: impl ArtifactLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            state: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Index over an in-memory artifact
    pub fn from_artifact(artifact: MappingArtifact) -> Self {
        Self::new(StaticArtifactLoader(artifact))
    }

    fn load_or_empty(&self) -> MappingArtifact {
        match self.loader.load() {
            Ok(artifact) => artifact,
            Err(e) => {
                log::warn!("Failed to load set mappings, using an empty mapping: {}", e);
                MappingArtifact::empty()
            }
        }
    }

    fn loaded(&self) -> Arc<LoadedIndex> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = state.as_ref() {
                return Arc::clone(index);
            }
        }

        // Read the artifact without holding the lock; loading does blocking I/O
        let index = Arc::new(LoadedIndex::build(self.load_or_empty()));

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have installed one meanwhile; theirs wins
        if let Some(existing) = state.as_ref() {
            return Arc::clone(existing);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = Some(Arc::clone(&index));
        index
    }

    /// Drop the current index; the next call loads the artifact again
    pub fn reload(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = None;
        log::info!("Set mapping index invalidated");
    }

    /// Number of times a loaded artifact has been installed
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Catalog A set id for a Catalog B set id
    pub fn lookup(&self, catalog_b_set_id: u64) -> Option<String> {
        self.loaded().reverse.get(&catalog_b_set_id).cloned()
    }

    pub fn has_mapping(&self, catalog_b_set_id: u64) -> bool {
        self.loaded().reverse.contains_key(&catalog_b_set_id)
    }

    /// Mapping for a Catalog A set id
    pub fn forward(&self, catalog_a_set_id: &str) -> Option<SetMapping> {
        self.loaded().artifact.get(catalog_a_set_id).cloned()
    }

    pub fn stats(&self) -> MappingMetadata {
        self.loaded().artifact.metadata.clone()
    }

    pub fn list_unmapped(&self, side: CardSource) -> UnmappedList {
        let index = self.loaded();
        let unmapped = &index.artifact.unmapped;
        match side {
            CardSource::CatalogA => UnmappedList::CatalogA(unmapped.catalog_a.clone()),
            CardSource::CatalogB => UnmappedList::CatalogB(unmapped.catalog_b.clone()),
        }
    }

    /// Catalog B set ids claimed by more than one Catalog A set
    pub fn collisions(&self) -> BTreeMap<u64, Vec<String>> {
        self.loaded().collisions.clone()
    }
}
