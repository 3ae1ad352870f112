//! Card service: serves cards from the volatile cache, the store or the
//! catalogs, enriching them with cross-catalog data on the way.
//!
//! Read path for a single card:
//! 1. volatile cache (unless forced)
//! 2. persistent store, if its pricing is still fresh (unless forced)
//! 3. base fetch from the card's own catalog, then enrichment from the other
//!
//! Only the base fetch can fail a request. Enrichment failures are logged and
//! leave the corresponding fields empty.
//!
//! There is no single-flight guard: two concurrent requests for the same
//! card may both fetch and both upsert. Upserts are idempotent.

use crate::api::{CatalogAApi, CatalogBApi, PokeDataCard, PricingPayload, TcgCard};
use crate::cache::VolatileCache;
use crate::cache_keys::{pricing_status, CacheKey};
use crate::card_matching::find_by_number;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::mapping_index::MappingIndex;
use crate::normalize;
use crate::store::{CardStore, Page};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tcg_common::{CardId, CardRecord, CardSource, CatalogASet};

/// Tunables of the card service
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub pricing_stale_after: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub current_set_window_days: i64,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            pricing_stale_after: config.pricing_stale_after(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            current_set_window_days: config.current_set_window_days,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            pricing_stale_after: Duration::hours(24),
            default_page_size: 100,
            max_page_size: 500,
            current_set_window_days: 180,
        }
    }
}

/// A served card and where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub card: CardRecord,
    /// True when served from the volatile cache or the store
    pub cached: bool,
    /// Age of the volatile cache entry, if served from it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<u64>,
}

pub struct CardService {
    catalog_a: Arc<dyn CatalogAApi>,
    catalog_b: Arc<dyn CatalogBApi>,
    store: Arc<dyn CardStore>,
    cache: Arc<VolatileCache>,
    mappings: Arc<MappingIndex>,
    settings: ServiceSettings,
}

impl CardService {
    pub fn new(
        catalog_a: Arc<dyn CatalogAApi>,
        catalog_b: Arc<dyn CatalogBApi>,
        store: Arc<dyn CardStore>,
        cache: Arc<VolatileCache>,
        mappings: Arc<MappingIndex>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            catalog_a,
            catalog_b,
            store,
            cache,
            mappings,
            settings,
        }
    }

    // ── single card ──────────────────────────────────────────────────

    pub async fn get_card(&self, id: &str, force_refresh: bool) -> SyncResult<CardResponse> {
        let card_id =
            CardId::parse(id).map_err(|_| SyncError::NotFound(format!("card {}", id.trim())))?;
        let id = card_id.to_string();
        let key = CacheKey::card(&id);

        if !force_refresh {
            if let Some(hit) = self.cache.get::<CardRecord>(&key).await {
                log::debug!("Serving card {} from volatile cache", id);
                return Ok(CardResponse {
                    card: hit.value,
                    cached: true,
                    cache_age_seconds: Some(hit.age_seconds),
                });
            }
        }

        let now = Utc::now();
        let stored = match self.store.get_card(&id, card_id.partition()).await {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Store read failed for card {}, treating as missing: {}", id, e);
                None
            }
        };

        if let Some(card) = &stored {
            let status = pricing_status(
                card.pricing_last_updated,
                now,
                self.settings.pricing_stale_after,
            );
            if !force_refresh && !status.needs_refresh() {
                log::debug!("Serving card {} from store", id);
                self.cache.set(&key, card).await;
                return Ok(CardResponse {
                    card: card.clone(),
                    cached: true,
                    cache_age_seconds: None,
                });
            }
            log::info!("Card {} pricing is {:?}, refreshing", id, status);
        }

        let mut record = self.fetch_base(&card_id, force_refresh).await?;
        if let Some(previous) = &stored {
            record.carry_enrichment_from(previous);
        }

        self.enrich(&mut record, force_refresh).await;
        self.persist(&record).await;

        Ok(CardResponse {
            card: record,
            cached: false,
            cache_age_seconds: None,
        })
    }

    /// Fetch from the card's own catalog; the only step allowed to fail a request
    async fn fetch_base(&self, card_id: &CardId, force_refresh: bool) -> SyncResult<CardRecord> {
        let result = match card_id {
            CardId::CatalogA { id, .. } => self
                .catalog_a
                .get_card(id)
                .await
                .map(|card| normalize::card_from_catalog_a(&card)),
            CardId::CatalogB(id) => self
                .fetch_pricing(*id, force_refresh)
                .await
                .map(|(payload, fetched_at)| normalize::card_from_catalog_b(&payload, fetched_at)),
        };

        result.map_err(|e| {
            if e.is_not_found() {
                SyncError::NotFound(format!("card {}", card_id))
            } else {
                log::error!("Failed to fetch card {}: {}", card_id, e);
                e
            }
        })
    }

    async fn enrich(&self, record: &mut CardRecord, force_refresh: bool) {
        match record.source {
            CardSource::CatalogA => {
                if record.cross_catalog_id.is_none() {
                    if let Err(e) = self.discover_catalog_b_card(record).await {
                        log::warn!("Cross-catalog lookup failed for {}: {}", record.id, e);
                    }
                }
                if let Err(e) = self.refresh_pricing(record, force_refresh).await {
                    log::warn!("Pricing refresh failed for {}: {}", record.id, e);
                }
            }
            CardSource::CatalogB => {
                let result = if record.cross_catalog_id.is_none() {
                    self.discover_catalog_a_card(record).await
                } else if record.images.is_none() {
                    self.copy_catalog_a_images(record).await
                } else {
                    Ok(())
                };
                if let Err(e) = result {
                    log::warn!("Cross-catalog lookup failed for {}: {}", record.id, e);
                }
            }
        }
    }

    /// Find the Catalog B card for a Catalog A card by collector number
    async fn discover_catalog_b_card(&self, record: &mut CardRecord) -> SyncResult<()> {
        let Some(mapping) = self.mappings.forward(&record.set_id) else {
            log::debug!("Set {} has no Catalog B mapping", record.set_id);
            return Ok(());
        };

        let cards = self.catalog_b_set_cards(mapping.catalog_b_set_id).await?;
        match find_by_number(&cards, &record.card_number, |card| card.num.as_str()) {
            Some(card) => {
                log::info!("Matched {} to Catalog B card {}", record.id, card.id);
                record.cross_catalog_id = Some(card.id.to_string());
            }
            None => log::info!(
                "No card numbered {} in Catalog B set {}",
                record.card_number,
                mapping.catalog_b_set_id
            ),
        }
        Ok(())
    }

    /// Find the Catalog A card for a Catalog B card and take its images
    async fn discover_catalog_a_card(&self, record: &mut CardRecord) -> SyncResult<()> {
        let Ok(b_set_id) = record.set_id.parse::<u64>() else {
            log::debug!("Card {} has no numeric Catalog B set id", record.id);
            return Ok(());
        };
        let Some(a_set_id) = self.mappings.lookup(b_set_id) else {
            log::debug!("Catalog B set {} has no Catalog A mapping", b_set_id);
            return Ok(());
        };

        let cards = self.catalog_a_set_cards(&a_set_id).await?;
        match find_by_number(&cards, &record.card_number, |card| card.number.as_str()) {
            Some(card) => {
                log::info!("Matched {} to Catalog A card {}", record.id, card.id);
                record.cross_catalog_id = Some(card.id.clone());
                record.images = normalize::card_images(card);
            }
            None => log::info!(
                "No card numbered {} in Catalog A set {}",
                record.card_number,
                a_set_id
            ),
        }
        Ok(())
    }

    async fn copy_catalog_a_images(&self, record: &mut CardRecord) -> SyncResult<()> {
        let Some(a_card_id) = record.cross_catalog_id.clone() else {
            return Ok(());
        };
        let card = self.catalog_a.get_card(&a_card_id).await?;
        record.images = normalize::card_images(&card);
        Ok(())
    }

    /// Fetch enhanced pricing for a Catalog A card when missing or stale
    async fn refresh_pricing(
        &self,
        record: &mut CardRecord,
        force_refresh: bool,
    ) -> SyncResult<()> {
        let status = pricing_status(
            record.pricing_last_updated,
            Utc::now(),
            self.settings.pricing_stale_after,
        );
        if !force_refresh && !status.needs_refresh() {
            return Ok(());
        }
        let Some(b_card_id) = record.cross_catalog_id.as_deref() else {
            return Ok(());
        };
        let b_card_id: u64 = b_card_id.parse().map_err(|_| {
            SyncError::InvalidCatalog(format!("Catalog B card id {:?} is not numeric", b_card_id))
        })?;

        let (payload, fetched_at) = self.fetch_pricing(b_card_id, force_refresh).await?;
        normalize::apply_pricing(record, &payload, fetched_at);
        Ok(())
    }

    /// Catalog B pricing, read through the volatile cache.
    ///
    /// A cached payload reports its original fetch time.
    async fn fetch_pricing(
        &self,
        card_id: u64,
        force_refresh: bool,
    ) -> SyncResult<(PricingPayload, DateTime<Utc>)> {
        let key = CacheKey::card_pricing(&card_id.to_string());
        if !force_refresh {
            if let Some(hit) = self.cache.get::<PricingPayload>(&key).await {
                let age = Duration::seconds(i64::try_from(hit.age_seconds).unwrap_or(0));
                return Ok((hit.value, Utc::now() - age));
            }
        }

        let payload = self.catalog_b.get_card_pricing(card_id).await?;
        self.cache.set(&key, &payload).await;
        Ok((payload, Utc::now()))
    }

    async fn catalog_a_set_cards(&self, set_id: &str) -> SyncResult<Vec<TcgCard>> {
        let key = CacheKey::catalog_set_cards(CardSource::CatalogA, set_id);
        if let Some(hit) = self.cache.get::<Vec<TcgCard>>(&key).await {
            return Ok(hit.value);
        }
        let cards = self.catalog_a.list_cards_in_set(set_id).await?;
        self.cache.set(&key, &cards).await;
        Ok(cards)
    }

    async fn catalog_b_set_cards(&self, set_id: u64) -> SyncResult<Vec<PokeDataCard>> {
        let key = CacheKey::catalog_set_cards(CardSource::CatalogB, &set_id.to_string());
        if let Some(hit) = self.cache.get::<Vec<PokeDataCard>>(&key).await {
            return Ok(hit.value);
        }
        let cards = self.catalog_b.list_cards_in_set(set_id).await?;
        self.cache.set(&key, &cards).await;
        Ok(cards)
    }

    /// Upsert, refresh the card's cache entry and drop its set's cached pages
    async fn persist(&self, record: &CardRecord) {
        if let Err(e) = self.store.upsert_card(record).await {
            log::error!("Failed to save card {}: {}", record.id, e);
        }
        self.cache.set(&CacheKey::card(&record.id), record).await;
        self.cache
            .clear(&CacheKey::cards_for_set_pattern(&record.set_id))
            .await;
    }

    // ── cards of a set ───────────────────────────────────────────────

    /// Clamp a requested page to the configured limits
    pub fn page_bounds(&self, page: u32, page_size: u32) -> (u32, u32) {
        let page = page.max(1);
        let page_size = match page_size {
            0 => self.settings.default_page_size,
            size => size.min(self.settings.max_page_size),
        };
        (page, page_size)
    }

    /// One page of a set's cards; counts always come from the store
    pub async fn list_cards_in_set(
        &self,
        set_id: &str,
        page: u32,
        page_size: u32,
        force_refresh: bool,
    ) -> SyncResult<Page<CardRecord>> {
        let (page, page_size) = self.page_bounds(page, page_size);
        // Catalog A set ids are lower-case upstream; Catalog B ids are numeric
        let set_id = set_id.trim().to_lowercase();
        let set_id = set_id.as_str();
        let key = CacheKey::cards_for_set(set_id, page, page_size);

        if !force_refresh {
            if let Some(hit) = self.cache.get::<Page<CardRecord>>(&key).await {
                return Ok(hit.value);
            }
        }

        let mut result = self.store.cards_by_set(set_id, page, page_size).await?;
        if force_refresh || result.total_count == 0 {
            self.sync_set(set_id).await?;
            result = self.store.cards_by_set(set_id, page, page_size).await?;
        }

        self.cache.set(&key, &result).await;
        Ok(result)
    }

    /// Fetch every card of a set from its catalog and save them one by one
    async fn sync_set(&self, set_id: &str) -> SyncResult<()> {
        log::info!("Syncing cards of set {} from upstream", set_id);

        let fetched: Vec<CardRecord> = match set_id.parse::<u64>() {
            Ok(b_set_id) => {
                let cards = self.catalog_b.list_cards_in_set(b_set_id).await?;
                self.cache
                    .set(&CacheKey::catalog_set_cards(CardSource::CatalogB, set_id), &cards)
                    .await;
                cards
                    .iter()
                    .map(|card| {
                        let mut record = normalize::card_from_catalog_b_listing(card);
                        if record.set_id.is_empty() {
                            record.set_id = set_id.to_string();
                        }
                        record
                    })
                    .collect()
            }
            Err(_) => {
                let cards = self.catalog_a.list_cards_in_set(set_id).await?;
                self.cache
                    .set(&CacheKey::catalog_set_cards(CardSource::CatalogA, set_id), &cards)
                    .await;
                cards.iter().map(normalize::card_from_catalog_a).collect()
            }
        };

        let mut records = Vec::with_capacity(fetched.len());
        for mut record in fetched {
            let partition = (record.source == CardSource::CatalogA).then_some(set_id);
            if let Ok(Some(previous)) = self.store.get_card(&record.id, partition).await {
                record.carry_enrichment_from(&previous);
            }
            records.push(record);
        }

        let summary = self.store.save_cards(&records).await;
        self.cache
            .clear(&CacheKey::cards_for_set_pattern(set_id))
            .await;
        log::info!(
            "Saved {} cards of set {} ({} failed)",
            summary.saved,
            set_id,
            summary.failed
        );
        Ok(())
    }

    // ── sets ─────────────────────────────────────────────────────────

    pub async fn list_sets(&self, force_refresh: bool) -> SyncResult<Vec<CatalogASet>> {
        let key = CacheKey::set_list();
        if !force_refresh {
            if let Some(hit) = self.cache.get::<Vec<CatalogASet>>(&key).await {
                return Ok(hit.value);
            }
        }

        let mut sets = if force_refresh {
            Vec::new()
        } else {
            self.store.all_sets().await
        };
        if sets.is_empty() {
            sets = self.refresh_sets().await?;
        }

        self.cache.set(&key, &sets).await;
        Ok(sets)
    }

    /// Sets released within the configured window, newest first
    pub async fn current_sets(&self, force_refresh: bool) -> SyncResult<Vec<CatalogASet>> {
        let key = CacheKey::current_sets();
        if !force_refresh {
            if let Some(hit) = self.cache.get::<Vec<CatalogASet>>(&key).await {
                return Ok(hit.value);
            }
        }

        let since = self.current_since(Utc::now().date_naive());
        let sets = if force_refresh || self.store.all_sets().await.is_empty() {
            self.refresh_sets()
                .await?
                .into_iter()
                .filter(|set| set.release_date >= since)
                .collect()
        } else {
            self.store.current_sets(since).await
        };

        self.cache.set(&key, &sets).await;
        Ok(sets)
    }

    fn current_since(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.settings.current_set_window_days)
    }

    /// Fetch the Catalog A set list and save it
    async fn refresh_sets(&self) -> SyncResult<Vec<CatalogASet>> {
        let fetched = self.catalog_a.list_sets().await?;
        let mut sets: Vec<CatalogASet> = fetched
            .into_iter()
            .filter_map(|set| {
                let id = set.id.clone();
                set.into_catalog_set()
                    .map_err(|e| log::warn!("Skipping set {}: {}", id, e))
                    .ok()
            })
            .collect();
        sets.sort_by(|a, b| b.release_date.cmp(&a.release_date).then_with(|| a.id.cmp(&b.id)));

        if let Err(e) = self.store.upsert_sets(&sets).await {
            log::error!("Failed to save sets: {}", e);
        }
        self.cache.delete(&CacheKey::set_list()).await;
        self.cache.delete(&CacheKey::current_sets()).await;
        Ok(sets)
    }
}

#[cfg(test)]
#[path = "enrichment_tests.rs"]
mod tests;
