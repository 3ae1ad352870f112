//! Tests for the card service, against in-memory catalogs with call counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{CardService, ServiceSettings};
use crate::api::pokemon_tcg::{TcgCardSet, TcgImages};
use crate::api::{
    CatalogAApi, CatalogBApi, PokeDataCard, PokeDataSet, PriceValue, PricingPayload, TcgCard,
    TcgSet,
};
use crate::cache::{MemoryCache, VolatileCache};
use crate::cache_keys::{CacheKey, CacheTtls};
use crate::database::SqliteStore;
use crate::error::{SyncError, SyncResult};
use crate::mapping_index::MappingIndex;
use crate::store::CardStore;
use tcg_common::{CardRecord, CardSource, MappingArtifact, MatchType, SetMapping};

// ── fakes ────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeCatalogA {
    sets: Vec<TcgSet>,
    cards: HashMap<String, Vec<TcgCard>>,
    fail_get_card: bool,
    fail_list_cards: bool,
    list_sets_calls: AtomicUsize,
    list_cards_calls: AtomicUsize,
    get_card_calls: AtomicUsize,
}

#[async_trait]
impl CatalogAApi for FakeCatalogA {
    async fn list_sets(&self) -> SyncResult<Vec<TcgSet>> {
        self.list_sets_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sets.clone())
    }

    async fn list_cards_in_set(&self, set_id: &str) -> SyncResult<Vec<TcgCard>> {
        self.list_cards_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_cards {
            return Err(SyncError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        }
        self.cards
            .get(set_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("set {}", set_id)))
    }

    async fn get_card(&self, card_id: &str) -> SyncResult<TcgCard> {
        self.get_card_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_card {
            return Err(SyncError::HttpStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        self.cards
            .values()
            .flatten()
            .find(|card| card.id == card_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("card {}", card_id)))
    }
}

#[derive(Default)]
struct FakeCatalogB {
    cards: HashMap<u64, Vec<PokeDataCard>>,
    pricing: HashMap<u64, PricingPayload>,
    fail_pricing: bool,
    fail_list_cards: bool,
    list_cards_calls: AtomicUsize,
    pricing_calls: AtomicUsize,
}

#[async_trait]
impl CatalogBApi for FakeCatalogB {
    async fn list_sets(&self, _language: Option<&str>) -> SyncResult<Vec<PokeDataSet>> {
        Ok(Vec::new())
    }

    async fn list_cards_in_set(&self, set_id: u64) -> SyncResult<Vec<PokeDataCard>> {
        self.list_cards_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_cards {
            return Err(SyncError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        }
        self.cards
            .get(&set_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("set {}", set_id)))
    }

    async fn get_card_pricing(&self, card_id: u64) -> SyncResult<PricingPayload> {
        self.pricing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pricing {
            return Err(SyncError::HttpStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        self.pricing
            .get(&card_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("card {}", card_id)))
    }
}

// ── fixtures ─────────────────────────────────────────────────────────

fn tcg_card(set_id: &str, number: &str) -> TcgCard {
    TcgCard {
        id: format!("{}-{}", set_id, number),
        name: format!("Card {}", number),
        number: number.to_string(),
        rarity: Some("Common".to_string()),
        set: TcgCardSet {
            id: set_id.to_string(),
            name: "Scarlet & Violet".to_string(),
            ptcgo_code: Some("SVI".to_string()),
        },
        images: Some(TcgImages {
            small: Some(format!("https://images.example/{}/{}.png", set_id, number)),
            large: None,
        }),
        tcgplayer: None,
    }
}

fn pokedata_card(id: u64, set_id: u64, num: &str) -> PokeDataCard {
    PokeDataCard {
        id,
        name: format!("Card {}", num),
        num: num.to_string(),
        set_id: Some(set_id),
        set_name: Some("Scarlet & Violet Base".to_string()),
        set_code: Some("SVI".to_string()),
    }
}

fn pricing(id: u64, set_id: u64, num: &str, psa10: f64) -> PricingPayload {
    PricingPayload {
        id,
        name: format!("Card {}", num),
        num: num.to_string(),
        set_id: Some(set_id),
        set_name: Some("Scarlet & Violet Base".to_string()),
        set_code: Some("SVI".to_string()),
        pricing: BTreeMap::from([
            (
                "PSA 10.0".to_string(),
                PriceValue {
                    value: Some(psa10),
                    currency: Some("USD".to_string()),
                },
            ),
            (
                "eBay Raw".to_string(),
                PriceValue {
                    value: Some(2.5),
                    currency: Some("USD".to_string()),
                },
            ),
        ]),
    }
}

fn sv1_mapping() -> MappingArtifact {
    let mut artifact = MappingArtifact::empty();
    artifact.mappings.insert(
        "sv1".to_string(),
        SetMapping {
            catalog_a_set_id: "sv1".to_string(),
            catalog_b_set_id: 42,
            catalog_b_code: Some("SVI".to_string()),
            match_type: MatchType::CrossrefCode,
            date_diff_days: None,
        },
    );
    artifact.metadata.total_mappings = 1;
    artifact
}

/// Catalog A set sv1 with card 76, Catalog B set 42 with card 9001 numbered "076"
fn catalogs() -> (FakeCatalogA, FakeCatalogB) {
    let catalog_a = FakeCatalogA {
        cards: HashMap::from([(
            "sv1".to_string(),
            vec![tcg_card("sv1", "75"), tcg_card("sv1", "76")],
        )]),
        ..Default::default()
    };
    let catalog_b = FakeCatalogB {
        cards: HashMap::from([(
            42,
            vec![pokedata_card(9000, 42, "075"), pokedata_card(9001, 42, "076")],
        )]),
        pricing: HashMap::from([(9001, pricing(9001, 42, "076", 120.0))]),
        ..Default::default()
    };
    (catalog_a, catalog_b)
}

struct Harness {
    service: CardService,
    catalog_a: Arc<FakeCatalogA>,
    catalog_b: Arc<FakeCatalogB>,
    store: Arc<SqliteStore>,
    cache: Arc<VolatileCache>,
}

fn harness(catalog_a: FakeCatalogA, catalog_b: FakeCatalogB) -> Harness {
    let catalog_a = Arc::new(catalog_a);
    let catalog_b = Arc::new(catalog_b);
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let cache = Arc::new(VolatileCache::with_backend(
        Arc::new(MemoryCache::new()),
        CacheTtls::default(),
    ));
    let service = CardService::new(
        catalog_a.clone(),
        catalog_b.clone(),
        store.clone(),
        cache.clone(),
        Arc::new(MappingIndex::from_artifact(sv1_mapping())),
        ServiceSettings::default(),
    );
    Harness {
        service,
        catalog_a,
        catalog_b,
        store,
        cache,
    }
}

fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

// ── get_card ─────────────────────────────────────────────────────────

#[tokio::test]
async fn catalog_a_card_is_enriched_from_catalog_b() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert!(!response.cached);
    let card = &response.card;
    assert_eq!(card.source, CardSource::CatalogA);
    // "076" in Catalog B matches "76" in Catalog A
    assert_eq!(card.cross_catalog_id.as_deref(), Some("9001"));
    let enhanced = card.enhanced_pricing.as_ref().unwrap();
    assert_eq!(enhanced.psa.get("10"), Some(&120.0));
    assert_eq!(enhanced.ebay_raw, Some(2.5));
    assert!(card.pricing_last_updated.is_some());

    let stored = h.store.get_card("sv1-76", Some("sv1")).await.unwrap().unwrap();
    assert_eq!(&stored, card);
}

#[tokio::test]
async fn second_read_is_served_from_volatile_cache() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    h.service.get_card("sv1-76", false).await.unwrap();
    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert!(response.cached);
    assert!(response.cache_age_seconds.is_some());
    assert_eq!(calls(&h.catalog_a.get_card_calls), 1);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 1);
}

#[tokio::test]
async fn fresh_stored_card_is_served_from_store() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let mut record = crate::normalize::card_from_catalog_a(&tcg_card("sv1", "76"));
    record.cross_catalog_id = Some("9001".to_string());
    record.pricing_last_updated = Some(Utc::now() - Duration::hours(1));
    h.store.upsert_card(&record).await.unwrap();

    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert!(response.cached);
    assert!(response.cache_age_seconds.is_none());
    assert_eq!(calls(&h.catalog_a.get_card_calls), 0);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 0);
    // Store hits backfill the volatile cache
    assert!(h.cache.exists(&CacheKey::card("sv1-76")).await);
}

#[tokio::test]
async fn stale_pricing_is_refreshed_before_returning() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let stale_at = Utc::now() - Duration::hours(25);
    let mut record = crate::normalize::card_from_catalog_a(&tcg_card("sv1", "76"));
    record.cross_catalog_id = Some("9001".to_string());
    record.pricing_last_updated = Some(stale_at);
    h.store.upsert_card(&record).await.unwrap();

    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert!(!response.cached);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 1);
    // Known cross id is reused, no set lookup needed
    assert_eq!(calls(&h.catalog_b.list_cards_calls), 0);
    assert!(response.card.pricing_last_updated.unwrap() > stale_at);
}

#[tokio::test]
async fn unreachable_pricing_leaves_card_usable() {
    let (a, mut b) = catalogs();
    b.fail_pricing = true;
    let h = harness(a, b);

    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert_eq!(response.card.cross_catalog_id.as_deref(), Some("9001"));
    assert!(response.card.enhanced_pricing.is_none());
    assert!(response.card.pricing_last_updated.is_none());
}

#[tokio::test]
async fn unmapped_set_skips_enrichment() {
    let (mut a, b) = catalogs();
    a.cards.insert("base1".to_string(), vec![tcg_card("base1", "4")]);
    let h = harness(a, b);

    let response = h.service.get_card("base1-4", false).await.unwrap();

    assert!(response.card.cross_catalog_id.is_none());
    assert_eq!(calls(&h.catalog_b.list_cards_calls), 0);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 0);
}

#[tokio::test]
async fn failed_catalog_b_card_list_leaves_card_usable() {
    let (a, mut b) = catalogs();
    b.fail_list_cards = true;
    let h = harness(a, b);

    let response = h.service.get_card("sv1-76", false).await.unwrap();

    assert_eq!(response.card.id, "sv1-76");
    assert!(response.card.cross_catalog_id.is_none());
    assert!(response.card.enhanced_pricing.is_none());
    assert_eq!(calls(&h.catalog_b.list_cards_calls), 1);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 0);
    assert!(h.store.get_card("sv1-76", Some("sv1")).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_catalog_a_card_list_leaves_card_usable() {
    let (mut a, b) = catalogs();
    a.fail_list_cards = true;
    let h = harness(a, b);

    let response = h.service.get_card("9001", false).await.unwrap();

    let card = &response.card;
    assert!(card.cross_catalog_id.is_none());
    assert!(card.images.is_none());
    // Pricing comes from the base fetch and is unaffected
    assert!(card.enhanced_pricing.is_some());
    assert_eq!(calls(&h.catalog_a.list_cards_calls), 1);
}

#[tokio::test]
async fn empty_pricing_still_counts_as_refreshed() {
    let (a, mut b) = catalogs();
    b.pricing.insert(
        9001,
        PricingPayload {
            pricing: BTreeMap::new(),
            ..pricing(9001, 42, "076", 0.0)
        },
    );
    let h = harness(a, b);

    // Stored listing record without pricing
    h.service.list_cards_in_set("42", 1, 10, false).await.unwrap();
    h.cache.clear("*").await;

    let first = h.service.get_card("9001", false).await.unwrap();
    assert!(first.card.enhanced_pricing.is_none());
    assert!(first.card.pricing_last_updated.is_some());

    h.cache.clear("*").await;
    let second = h.service.get_card("9001", false).await.unwrap();

    assert!(second.cached);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 1);
}

#[tokio::test]
async fn catalog_b_card_gets_catalog_a_images() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let response = h.service.get_card("9001", false).await.unwrap();

    let card = &response.card;
    assert_eq!(card.source, CardSource::CatalogB);
    assert_eq!(card.cross_catalog_id.as_deref(), Some("sv1-76"));
    assert_eq!(
        card.images.as_ref().unwrap().small.as_deref(),
        Some("https://images.example/sv1/76.png")
    );
    assert!(card.enhanced_pricing.is_some());
    assert_eq!(calls(&h.catalog_a.list_cards_calls), 1);
}

#[tokio::test]
async fn base_fetch_failure_is_a_hard_error() {
    let (mut a, b) = catalogs();
    a.fail_get_card = true;
    let h = harness(a, b);

    let err = h.service.get_card("sv1-76", false).await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    for id in ["sv1-999", "12345", "not an id"] {
        match h.service.get_card(id, false).await {
            Err(SyncError::NotFound(_)) => {}
            other => panic!("Expected NotFound for {id:?}, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn force_refresh_bypasses_cache_and_store() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    h.service.get_card("sv1-76", false).await.unwrap();
    let response = h.service.get_card("sv1-76", true).await.unwrap();

    assert!(!response.cached);
    assert_eq!(calls(&h.catalog_a.get_card_calls), 2);
    assert_eq!(calls(&h.catalog_b.pricing_calls), 2);
    // The cross id survives the refetch without another set lookup
    assert_eq!(calls(&h.catalog_b.list_cards_calls), 1);
}

// ── list_cards_in_set ────────────────────────────────────────────────

#[tokio::test]
async fn large_page_returns_whole_set() {
    let catalog_a = FakeCatalogA {
        cards: HashMap::from([(
            "sv1".to_string(),
            (1..=180).map(|n| tcg_card("sv1", &n.to_string())).collect(),
        )]),
        ..Default::default()
    };
    let h = harness(catalog_a, FakeCatalogB::default());

    let page = h.service.list_cards_in_set("sv1", 1, 500, false).await.unwrap();

    assert_eq!(page.items.len(), 180);
    assert_eq!(page.total_count, 180);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items[0].card_number, "1");
    assert_eq!(page.items[179].card_number, "180");
}

#[tokio::test]
async fn pages_are_cached_and_store_is_filled_once() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let first = h.service.list_cards_in_set("sv1", 1, 1, false).await.unwrap();
    let again = h.service.list_cards_in_set("SV1", 1, 1, false).await.unwrap();
    let second = h.service.list_cards_in_set("sv1", 2, 1, false).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(first.total_pages, 2);
    assert_eq!(second.items[0].card_number, "76");
    assert_eq!(calls(&h.catalog_a.list_cards_calls), 1);
}

#[tokio::test]
async fn set_id_case_variants_agree_with_cold_cache() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let cold = h.service.list_cards_in_set("SV1", 1, 10, false).await.unwrap();
    assert_eq!(cold.total_count, 2);
    assert!(cold.items.iter().all(|c| c.set_id == "sv1"));

    h.cache.clear("*").await;
    let from_store = h.service.list_cards_in_set("SV1", 1, 10, false).await.unwrap();
    let lower = h.service.list_cards_in_set("sv1", 1, 10, false).await.unwrap();

    assert_eq!(from_store, cold);
    assert_eq!(lower, cold);
    assert_eq!(calls(&h.catalog_a.list_cards_calls), 1);
}

#[tokio::test]
async fn card_id_case_variants_agree_with_cold_cache() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let fetched = h.service.get_card("SV1-76", false).await.unwrap();
    assert_eq!(fetched.card.id, "sv1-76");

    h.cache.clear("*").await;
    let stored = h.service.get_card("SV1-76", false).await.unwrap();

    assert!(stored.cached);
    assert_eq!(stored.card, fetched.card);
    assert_eq!(calls(&h.catalog_a.get_card_calls), 1);
}

#[tokio::test]
async fn page_arguments_are_clamped() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    assert_eq!(h.service.page_bounds(0, 0), (1, 100));
    assert_eq!(h.service.page_bounds(3, 1000), (3, 500));

    let page = h.service.list_cards_in_set("sv1", 0, 0, false).await.unwrap();
    assert_eq!(page.page_number, 1);
    assert_eq!(page.page_size, 100);
}

#[tokio::test]
async fn forced_set_sync_keeps_enrichment() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    h.service.get_card("sv1-76", false).await.unwrap();
    let page = h.service.list_cards_in_set("sv1", 1, 10, true).await.unwrap();

    let pikachu = page.items.iter().find(|c| c.id == "sv1-76").unwrap();
    assert_eq!(pikachu.cross_catalog_id.as_deref(), Some("9001"));
    assert!(pikachu.enhanced_pricing.is_some());
}

#[tokio::test]
async fn card_write_clears_cached_pages_of_its_set() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    h.service.list_cards_in_set("sv1", 1, 10, false).await.unwrap();
    let page_key = CacheKey::cards_for_set("sv1", 1, 10);
    assert!(h.cache.exists(&page_key).await);

    h.service.get_card("sv1-75", true).await.unwrap();

    assert!(!h.cache.exists(&page_key).await);
}

#[tokio::test]
async fn catalog_b_sets_are_synced_from_catalog_b() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let page = h.service.list_cards_in_set("42", 1, 10, false).await.unwrap();

    assert_eq!(page.total_count, 2);
    assert!(page.items.iter().all(|c| c.source == CardSource::CatalogB));
    assert_eq!(calls(&h.catalog_b.list_cards_calls), 1);
}

#[tokio::test]
async fn unknown_set_is_not_found() {
    let h = harness(FakeCatalogA::default(), FakeCatalogB::default());
    let err = h.service.list_cards_in_set("nope", 1, 10, false).await.unwrap_err();
    assert!(err.is_not_found());
}

// ── sets ─────────────────────────────────────────────────────────────

fn tcg_set(id: &str, released: chrono::NaiveDate) -> TcgSet {
    TcgSet {
        id: id.to_string(),
        name: id.to_uppercase(),
        series: None,
        ptcgo_code: None,
        release_date: released.format("%Y/%m/%d").to_string(),
    }
}

#[tokio::test]
async fn sets_are_fetched_once_then_cached() {
    let today = Utc::now().date_naive();
    let catalog_a = FakeCatalogA {
        sets: vec![
            tcg_set("base1", chrono::NaiveDate::from_ymd_opt(1999, 1, 9).unwrap()),
            tcg_set("new1", today - Duration::days(10)),
        ],
        ..Default::default()
    };
    let h = harness(catalog_a, FakeCatalogB::default());

    let sets = h.service.list_sets(false).await.unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].id, "new1");

    h.service.list_sets(false).await.unwrap();
    assert_eq!(calls(&h.catalog_a.list_sets_calls), 1);
    assert_eq!(h.store.all_sets().await.len(), 2);
}

#[tokio::test]
async fn current_sets_use_release_window() {
    let today = Utc::now().date_naive();
    let catalog_a = FakeCatalogA {
        sets: vec![
            tcg_set("old1", today - Duration::days(400)),
            tcg_set("new1", today - Duration::days(10)),
        ],
        ..Default::default()
    };
    let h = harness(catalog_a, FakeCatalogB::default());

    let current = h.service.current_sets(false).await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, "new1");

    // Served from the store once it holds sets
    h.cache.clear("*").await;
    let current = h.service.current_sets(false).await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(calls(&h.catalog_a.list_sets_calls), 1);
}

#[tokio::test]
async fn card_record_round_trips_through_cache() {
    let (a, b) = catalogs();
    let h = harness(a, b);

    let fresh = h.service.get_card("9001", false).await.unwrap().card;
    let cached = h
        .cache
        .get::<CardRecord>(&CacheKey::card("9001"))
        .await
        .map(|hit| hit.value)
        .unwrap();

    assert_eq!(cached, fresh);
}
