//! Shared types for Pokémon card catalogs.
//!
//! Catalog A is the Pokémon TCG API (string set ids, cross-reference codes),
//! Catalog B is PokeData (numeric set ids, graded market pricing). Both the
//! offline set mapping job and the request-time card service use these types.

pub mod card;
pub mod error;
pub mod mapping;
pub mod sets;

pub use card::{
    CardId, CardImages, CardRecord, CardSource, EnhancedPricing, MarketPricing, PriceBand,
};
pub use error::{CommonError, CommonResult};
pub use mapping::{
    MappingArtifact, MappingMetadata, MatchType, SetMapping, UnmappedSets, ARTIFACT_VERSION,
};
pub use sets::{CatalogASet, CatalogBSet, ENGLISH};
