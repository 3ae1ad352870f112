//! Pokémon TCG API client (Catalog A)
//!
//! Uses async reqwest. List endpoints are paged upstream; the client follows
//! every page so callers always see complete sets.

use super::{check_status, string_or_number, CatalogAApi, USER_AGENT};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tcg_common::sets::parse_catalog_a_date;
use tcg_common::{CatalogASet, PriceBand};

/// Public API base URL
pub const POKEMON_TCG_API_URL: &str = "https://api.pokemontcg.io/v2";

/// Largest page the API serves
const PAGE_SIZE: u32 = 250;

/// Set as returned by `/sets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub ptcgo_code: Option<String>,
    pub release_date: String,
}

impl TcgSet {
    /// Convert into the shared set type; an unparseable date is an error
    pub fn into_catalog_set(self) -> SyncResult<CatalogASet> {
        let release_date = parse_catalog_a_date(&self.release_date)?;
        Ok(CatalogASet {
            id: self.id,
            name: self.name,
            cross_ref_code: self.ptcgo_code.filter(|code| !code.trim().is_empty()),
            release_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgCardSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ptcgo_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcgImages {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// TCGplayer block of a card: price bands per printing variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgPlayer {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub prices: BTreeMap<String, PriceBand>,
}

/// Card as returned by `/cards`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcgCard {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(default)]
    pub rarity: Option<String>,
    pub set: TcgCardSet,
    #[serde(default)]
    pub images: Option<TcgImages>,
    #[serde(default)]
    pub tcgplayer: Option<TcgPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SingleResponse<T> {
    data: T,
}

pub struct PokemonTcgClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PokemonTcgClient {
    pub fn new(config: &ApiConfig, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| POKEMON_TCG_API_URL.to_string()),
            api_key: config.api_key.clone(),
        })
    }

    /// Client against another base URL (for testing with mock servers)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> SyncResult<T> {
        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        check_status(&response, what)?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch every page of a list endpoint
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
        what: &str,
    ) -> SyncResult<Vec<T>> {
        let url = format!("{}/{}", self.base_url, path);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = extra.to_vec();
            query.push(("page", page.to_string()));
            query.push(("pageSize", PAGE_SIZE.to_string()));

            let response: PagedResponse<T> = self.get_json(&url, &query, what).await?;
            let received = response.data.len();
            items.extend(response.data);

            let total = response.total_count.unwrap_or(items.len());
            if received == 0 || items.len() >= total {
                break;
            }
            page += 1;
        }

        log::debug!("Fetched {} {} from Pokémon TCG API", items.len(), what);
        Ok(items)
    }
}

#[async_trait]
impl CatalogAApi for PokemonTcgClient {
    async fn list_sets(&self) -> SyncResult<Vec<TcgSet>> {
        log::info!("Fetching set list from Pokémon TCG API...");
        self.get_all_pages("sets", &[("orderBy", "releaseDate".to_string())], "sets")
            .await
    }

    async fn list_cards_in_set(&self, set_id: &str) -> SyncResult<Vec<TcgCard>> {
        log::info!("Fetching cards for set {} from Pokémon TCG API", set_id);
        let query = [("q", format!("set.id:{}", set_id))];
        let cards: Vec<TcgCard> = self.get_all_pages("cards", &query, "cards").await?;

        if cards.iter().any(|card| card.set.id != set_id) {
            return Err(SyncError::InvalidCatalog(format!(
                "card list for set {} contains cards from other sets",
                set_id
            )));
        }
        Ok(cards)
    }

    async fn get_card(&self, card_id: &str) -> SyncResult<TcgCard> {
        let url = format!("{}/cards/{}", self.base_url, urlencoding::encode(card_id));
        log::debug!("Fetching card from Pokémon TCG API: {}", card_id);
        let response: SingleResponse<TcgCard> = self
            .get_json(&url, &[], &format!("card {}", card_id))
            .await?;
        Ok(response.data)
    }
}

#[cfg(test)]
#[path = "pokemon_tcg_tests.rs"]
mod tests;
