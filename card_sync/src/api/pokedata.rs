//! PokeData API client (Catalog B)

use super::{check_status, string_or_number, CatalogBApi, USER_AGENT};
use crate::config::ApiConfig;
use crate::error::SyncResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tcg_common::sets::parse_catalog_b_date;
use tcg_common::CatalogBSet;

/// Public API base URL
pub const POKEDATA_API_URL: &str = "https://www.pokedata.io/v0";

/// Set as returned by `/sets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeDataSet {
    pub id: u64,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub language: String,
    pub release_date: String,
}

impl PokeDataSet {
    /// Convert into the shared set type; an unparseable date is an error
    pub fn into_catalog_set(self) -> SyncResult<CatalogBSet> {
        let release_date = parse_catalog_b_date(&self.release_date)?;
        Ok(CatalogBSet {
            id: self.id,
            code: self.code.filter(|code| !code.trim().is_empty()),
            name: self.name,
            language: self.language,
            release_date,
        })
    }
}

/// Card as listed by `/set?set_id=`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeDataCard {
    pub id: u64,
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub num: String,
    #[serde(default)]
    pub set_id: Option<u64>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub set_code: Option<String>,
}

/// One provider price, e.g. the `"PSA 10.0"` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceValue {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Response of `/pricing?id=&asset_type=CARD`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPayload {
    pub id: u64,
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub num: String,
    #[serde(default)]
    pub set_id: Option<u64>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub set_code: Option<String>,
    /// Provider-keyed prices (`"PSA 10.0"`, `"CGC 9.5"`, `"TCGPlayer"`, `"eBay Raw"`)
    #[serde(default)]
    pub pricing: BTreeMap<String, PriceValue>,
}

pub struct PokeDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PokeDataClient {
    pub fn new(config: &ApiConfig, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| POKEDATA_API_URL.to_string()),
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
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> SyncResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        check_status(&response, what)?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl CatalogBApi for PokeDataClient {
    async fn list_sets(&self, language: Option<&str>) -> SyncResult<Vec<PokeDataSet>> {
        log::info!("Fetching set list from PokeData...");
        let sets: Vec<PokeDataSet> = self.get_json("sets", &[], "sets").await?;
        let total = sets.len();

        let sets: Vec<PokeDataSet> = match language {
            Some(language) => sets
                .into_iter()
                .filter(|set| set.language.eq_ignore_ascii_case(language))
                .collect(),
            None => sets,
        };

        log::info!("Fetched {} PokeData sets ({} after language filter)", total, sets.len());
        Ok(sets)
    }

    async fn list_cards_in_set(&self, set_id: u64) -> SyncResult<Vec<PokeDataCard>> {
        log::info!("Fetching cards for PokeData set {}", set_id);
        self.get_json(
            "set",
            &[("set_id", set_id.to_string())],
            &format!("set {}", set_id),
        )
        .await
    }

    async fn get_card_pricing(&self, card_id: u64) -> SyncResult<PricingPayload> {
        log::debug!("Fetching PokeData pricing for card {}", card_id);
        self.get_json(
            "pricing",
            &[("id", card_id.to_string()), ("asset_type", "CARD".to_string())],
            &format!("card {}", card_id),
        )
        .await
    }
}
