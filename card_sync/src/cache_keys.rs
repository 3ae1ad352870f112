//! Cache key derivation and TTL/staleness arithmetic
//!
//! Keys are typed (`ResourceKind` + lower-cased, percent-encoded parts) so two
//! resources can never render to the same string, and case variants of one
//! identifier (`SV1` / `sv1`) share one entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tcg_common::CardSource;

/// The kinds of resources kept in the volatile cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SetList,
    CurrentSets,
    /// One page of a set's cards as served to clients
    CardsForSet,
    Card,
    CardPricing,
    /// A catalog's full, raw card list for one set (used for enrichment)
    CatalogSetCards,
}

impl ResourceKind {
    fn prefix(&self) -> &'static str {
        match self {
            ResourceKind::SetList => "sets",
            ResourceKind::CurrentSets => "current-sets",
            ResourceKind::CardsForSet => "cards-for-set",
            ResourceKind::Card => "card",
            ResourceKind::CardPricing => "card-pricing",
            ResourceKind::CatalogSetCards => "catalog-set-cards",
        }
    }
}

/// Per-kind TTLs in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub set_list_secs: u64,
    pub current_sets_secs: u64,
    pub cards_for_set_secs: u64,
    pub card_secs: u64,
    pub card_pricing_secs: u64,
    pub catalog_set_cards_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            set_list_secs: 24 * 3600,
            current_sets_secs: 3600,
            cards_for_set_secs: 6 * 3600,
            card_secs: 3600,
            card_pricing_secs: 3600,
            catalog_set_cards_secs: 24 * 3600,
        }
    }
}

impl CacheTtls {
    pub fn ttl_for(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::SetList => self.set_list_secs,
            ResourceKind::CurrentSets => self.current_sets_secs,
            ResourceKind::CardsForSet => self.cards_for_set_secs,
            ResourceKind::Card => self.card_secs,
            ResourceKind::CardPricing => self.card_pricing_secs,
            ResourceKind::CatalogSetCards => self.catalog_set_cards_secs,
        }
    }
}

/// A fully derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ResourceKind,
    parts: Vec<String>,
}

fn normalize_part(part: &str) -> String {
    urlencoding::encode(&part.trim().to_lowercase()).into_owned()
}

impl CacheKey {
    fn new(kind: ResourceKind, parts: &[&str]) -> Self {
        Self {
            kind,
            parts: parts.iter().map(|p| normalize_part(p)).collect(),
        }
    }

    pub fn set_list() -> Self {
        Self::new(ResourceKind::SetList, &[])
    }

    pub fn current_sets() -> Self {
        Self::new(ResourceKind::CurrentSets, &[])
    }

    pub fn cards_for_set(set_id: &str, page: u32, page_size: u32) -> Self {
        Self::new(
            ResourceKind::CardsForSet,
            &[set_id, &page.to_string(), &page_size.to_string()],
        )
    }

    pub fn card(card_id: &str) -> Self {
        Self::new(ResourceKind::Card, &[card_id])
    }

    pub fn card_pricing(card_id: &str) -> Self {
        Self::new(ResourceKind::CardPricing, &[card_id])
    }

    pub fn catalog_set_cards(source: CardSource, set_id: &str) -> Self {
        Self::new(ResourceKind::CatalogSetCards, &[source.as_str(), set_id])
    }

    /// Glob pattern matching every page cached for a set
    pub fn cards_for_set_pattern(set_id: &str) -> String {
        format!(
            "{}:{}:*",
            ResourceKind::CardsForSet.prefix(),
            normalize_part(set_id)
        )
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.prefix())?;
        for part in &self.parts {
            write!(f, ":{}", part)?;
        }
        Ok(())
    }
}

/// Match a key against a glob pattern where `*` matches any run of characters
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    if pieces.is_empty() {
        return rest.is_empty();
    }

    for (i, piece) in pieces.iter().enumerate() {
        let last = i == pieces.len() - 1;
        if last {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    true
}

/// A cached value with its write time and TTL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    /// Write time, epoch milliseconds
    pub timestamp: i64,
    pub ttl_seconds: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl_seconds: u64, now_ms: i64) -> Self {
        Self {
            data,
            timestamp: now_ms,
            ttl_seconds,
        }
    }

    pub fn expires_at_ms(&self) -> i64 {
        let ttl_ms = i64::try_from(self.ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.timestamp.saturating_add(ttl_ms)
    }

    /// Expired iff `now > timestamp + ttl`
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms()
    }

    pub fn age_seconds(&self, now_ms: i64) -> u64 {
        u64::try_from((now_ms - self.timestamp).max(0) / 1000).unwrap_or(0)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Freshness of a card's enhanced pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingStatus {
    Fresh,
    Stale,
    Missing,
}

impl PricingStatus {
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, PricingStatus::Fresh)
    }
}

/// Pricing is stale once its age exceeds `stale_after`, missing if never fetched
pub fn pricing_status(
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> PricingStatus {
    match last_updated {
        None => PricingStatus::Missing,
        Some(updated) if now - updated > stale_after => PricingStatus::Stale,
        Some(_) => PricingStatus::Fresh,
    }
}
