//! API clients for the external card catalogs (Pokémon TCG API, PokeData)
//!
//! The traits are the contracts the card service depends on; payloads are
//! returned raw and normalized by the caller.

pub mod pokedata;
pub mod pokemon_tcg;

pub use pokedata::{PokeDataCard, PokeDataClient, PokeDataSet, PriceValue, PricingPayload};
pub use pokemon_tcg::{PokemonTcgClient, TcgCard, TcgSet};

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

/// User agent sent with every catalog request
pub(crate) const USER_AGENT: &str = "card_sync/1.0";

/// Catalog A: string set ids, cards with images and TCGplayer prices
#[async_trait]
pub trait CatalogAApi: Send + Sync {
    async fn list_sets(&self) -> SyncResult<Vec<TcgSet>>;
    /// Every card of a set, across all upstream pages
    async fn list_cards_in_set(&self, set_id: &str) -> SyncResult<Vec<TcgCard>>;
    async fn get_card(&self, card_id: &str) -> SyncResult<TcgCard>;
}

/// Catalog B: numeric set ids, graded market pricing
#[async_trait]
pub trait CatalogBApi: Send + Sync {
    async fn list_sets(&self, language: Option<&str>) -> SyncResult<Vec<PokeDataSet>>;
    async fn list_cards_in_set(&self, set_id: u64) -> SyncResult<Vec<PokeDataCard>>;
    async fn get_card_pricing(&self, card_id: u64) -> SyncResult<PricingPayload>;
}

/// Map a non-success response to an error, keeping 404 distinct
pub(crate) fn check_status(response: &reqwest::Response, what: &str) -> SyncResult<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(SyncError::NotFound(what.to_string()))
    } else {
        Err(SyncError::HttpStatus(status))
    }
}

/// Card numbers arrive as strings (`"076"`) but occasionally as bare numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
