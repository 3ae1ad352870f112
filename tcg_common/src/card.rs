//! Card records served by the card service

use crate::error::{CommonError, CommonResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which catalog a card record originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardSource {
    CatalogA,
    CatalogB,
}

impl CardSource {
    /// The other catalog
    pub fn sibling(&self) -> CardSource {
        match self {
            CardSource::CatalogA => CardSource::CatalogB,
            CardSource::CatalogB => CardSource::CatalogA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardSource::CatalogA => "catalogA",
            CardSource::CatalogB => "catalogB",
        }
    }
}

impl fmt::Display for CardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed card identifier.
///
/// Catalog B ids are plain numbers. Catalog A ids embed their set id
/// (`sv1-76`, `swsh12pt5gg-GG01`); the part before the last `-` is the set.
/// Catalog A set ids are lower-case upstream, so the set part is lower-cased
/// on parse. The number keeps its casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CardId {
    CatalogA { id: String, set_id: String },
    CatalogB(u64),
}

impl CardId {
    pub fn parse(raw: &str) -> CommonResult<Self> {
        let raw = raw.trim();
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            return raw
                .parse::<u64>()
                .map(CardId::CatalogB)
                .map_err(|_| CommonError::InvalidCardId(raw.to_string()));
        }

        match raw.rsplit_once('-') {
            Some((set_id, number))
                if !set_id.is_empty()
                    && !number.is_empty()
                    && set_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') =>
            {
                let set_id = set_id.to_lowercase();
                Ok(CardId::CatalogA {
                    id: format!("{}-{}", set_id, number),
                    set_id,
                })
            }
            _ => Err(CommonError::InvalidCardId(raw.to_string())),
        }
    }

    pub fn source(&self) -> CardSource {
        match self {
            CardId::CatalogA { .. } => CardSource::CatalogA,
            CardId::CatalogB(_) => CardSource::CatalogB,
        }
    }

    /// Store partition embedded in the id (Catalog A only)
    pub fn partition(&self) -> Option<&str> {
        match self {
            CardId::CatalogA { set_id, .. } => Some(set_id),
            CardId::CatalogB(_) => None,
        }
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardId::CatalogA { id, .. } => f.write_str(id),
            CardId::CatalogB(id) => write!(f, "{}", id),
        }
    }
}

/// Price band for one printing variant (holofoil, reverseHolofoil, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<f64>,
}

/// Origin catalog market prices keyed by printing variant
pub type MarketPricing = BTreeMap<String, PriceBand>;

/// Graded and raw market prices normalized across providers.
///
/// Grade keys are normalized (`"10"`, `"9.5"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedPricing {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub psa: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cgc: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bgs: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcgplayer: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebay_raw: Option<f64>,
}

impl EnhancedPricing {
    pub fn is_empty(&self) -> bool {
        self.psa.is_empty()
            && self.cgc.is_empty()
            && self.bgs.is_empty()
            && self.tcgplayer.is_none()
            && self.ebay_raw.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
}

/// A card as served to clients and persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub id: String,
    pub set_id: String,
    pub set_code: String,
    pub card_name: String,
    pub card_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    /// Id of the same card in the other catalog, once discovered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<MarketPricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_pricing: Option<EnhancedPricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<CardImages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_last_updated: Option<DateTime<Utc>>,
    pub source: CardSource,
}

impl CardRecord {
    /// Age of the enhanced pricing, `None` if it was never fetched
    pub fn pricing_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.pricing_last_updated.map(|updated| now - updated)
    }

    /// Carry enrichment already known for this card onto a freshly fetched record.
    ///
    /// Fields the fresh record already has win.
    pub fn carry_enrichment_from(&mut self, previous: &CardRecord) {
        if self.cross_catalog_id.is_none() {
            self.cross_catalog_id = previous.cross_catalog_id.clone();
        }
        // A fresh pricing fetch wins even when it came back empty
        if self.pricing_last_updated.is_none() {
            self.enhanced_pricing = previous.enhanced_pricing.clone();
            self.pricing_last_updated = previous.pricing_last_updated;
        }
        if self.images.is_none() {
            self.images = previous.images.clone();
        }
    }
}
