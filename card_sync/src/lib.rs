//! Card Sync - Pokémon card identity resolution and enrichment
//!
//! Maps the sets of two independent card catalogs onto each other (offline
//! job) and serves cards enriched with data from both catalogs, backed by a
//! volatile cache and a SQLite store.

pub mod api;
pub mod cache;
pub mod cache_keys;
pub mod card_matching;
pub mod config;
pub mod database;
pub mod enrichment;
pub mod error;
pub mod mapping_index;
pub mod normalize;
pub mod set_mapping;
pub mod store;

pub use api::{CatalogAApi, CatalogBApi, PokeDataClient, PokemonTcgClient};
pub use cache::{CacheBackend, CacheConnector, MemoryCache, VolatileCache};
pub use cache_keys::{CacheEntry, CacheKey, CacheTtls, ResourceKind};
pub use config::Config;
pub use database::SqliteStore;
pub use enrichment::{CardResponse, CardService, ServiceSettings};
pub use error::{SyncError, SyncResult};
pub use mapping_index::{ArtifactLoader, FileArtifactLoader, MappingIndex, UnmappedList};
pub use set_mapping::SetResolver;
pub use store::{CardStore, Page, SaveSummary};
