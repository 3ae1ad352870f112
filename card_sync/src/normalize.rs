//! Normalization of raw catalog payloads into card records
//!
//! The catalog clients return provider payloads untouched; everything the
//! card service stores or serves passes through here first.

use crate::api::{PokeDataCard, PriceValue, PricingPayload, TcgCard};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tcg_common::{CardImages, CardRecord, CardSource, EnhancedPricing};

/// Build a record from a Catalog A card
pub fn card_from_catalog_a(card: &TcgCard) -> CardRecord {
    let pricing = card
        .tcgplayer
        .as_ref()
        .map(|tcgplayer| tcgplayer.prices.clone())
        .filter(|prices| !prices.is_empty());

    CardRecord {
        id: card.id.clone(),
        set_id: card.set.id.clone(),
        set_code: card
            .set
            .ptcgo_code
            .clone()
            .unwrap_or_else(|| card.set.id.to_uppercase()),
        card_name: card.name.clone(),
        card_number: card.number.clone(),
        rarity: card.rarity.clone(),
        cross_catalog_id: None,
        pricing,
        enhanced_pricing: None,
        images: card_images(card),
        pricing_last_updated: None,
        source: CardSource::CatalogA,
    }
}

/// Image URLs of a Catalog A card
pub fn card_images(card: &TcgCard) -> Option<CardImages> {
    card.images.as_ref().map(|images| CardImages {
        small: images.small.clone(),
        large: images.large.clone(),
    })
}

/// Build a record from a Catalog B pricing payload fetched at `fetched_at`
pub fn card_from_catalog_b(payload: &PricingPayload, fetched_at: DateTime<Utc>) -> CardRecord {
    let mut record = CardRecord {
        id: payload.id.to_string(),
        set_id: payload.set_id.map(|id| id.to_string()).unwrap_or_default(),
        set_code: payload.set_code.clone().unwrap_or_default(),
        card_name: payload.name.clone(),
        card_number: payload.num.clone(),
        rarity: None,
        cross_catalog_id: None,
        pricing: None,
        enhanced_pricing: None,
        images: None,
        pricing_last_updated: None,
        source: CardSource::CatalogB,
    };
    apply_pricing(&mut record, payload, fetched_at);
    record
}

/// Build a record from a Catalog B set listing entry (no pricing yet)
pub fn card_from_catalog_b_listing(card: &PokeDataCard) -> CardRecord {
    CardRecord {
        id: card.id.to_string(),
        set_id: card.set_id.map(|id| id.to_string()).unwrap_or_default(),
        set_code: card.set_code.clone().unwrap_or_default(),
        card_name: card.name.clone(),
        card_number: card.num.clone(),
        rarity: None,
        cross_catalog_id: None,
        pricing: None,
        enhanced_pricing: None,
        images: None,
        pricing_last_updated: None,
        source: CardSource::CatalogB,
    }
}

/// Store freshly fetched pricing on a record.
///
/// The timestamp records the successful fetch even when the provider had no
/// prices, so an unpriced card is not re-fetched on every request.
pub fn apply_pricing(record: &mut CardRecord, payload: &PricingPayload, fetched_at: DateTime<Utc>) {
    let pricing = normalize_pricing(&payload.pricing);
    record.enhanced_pricing = if pricing.is_empty() {
        None
    } else {
        Some(pricing)
    };
    record.pricing_last_updated = Some(fetched_at);
}

enum PriceSlot {
    Psa(String),
    Cgc(String),
    Bgs(String),
    TcgPlayer,
    EbayRaw,
}

fn classify(key: &str) -> Option<PriceSlot> {
    let key = key.trim();
    match key.to_lowercase().as_str() {
        "tcgplayer" => return Some(PriceSlot::TcgPlayer),
        "ebay raw" => return Some(PriceSlot::EbayRaw),
        _ => {}
    }

    let (service, grade) = key.split_once(' ')?;
    let grade = normalize_grade(grade)?;
    match service.to_uppercase().as_str() {
        "PSA" => Some(PriceSlot::Psa(grade)),
        "CGC" => Some(PriceSlot::Cgc(grade)),
        "BGS" => Some(PriceSlot::Bgs(grade)),
        _ => None,
    }
}

/// `"10.0"` → `"10"`, `"9.5"` → `"9.5"`; anything else is not a grade
fn normalize_grade(grade: &str) -> Option<String> {
    let value: f64 = grade.trim().parse().ok()?;
    if !(0.0..=10.0).contains(&value) {
        return None;
    }
    if value.fract() == 0.0 {
        Some(format!("{:.0}", value))
    } else {
        Some(value.to_string())
    }
}

/// Fold provider-specific price keys into the enhanced pricing shape.
///
/// Unknown providers, missing values and non-positive prices are dropped.
pub fn normalize_pricing(pricing: &BTreeMap<String, PriceValue>) -> EnhancedPricing {
    let mut normalized = EnhancedPricing::default();

    for (key, price) in pricing {
        let Some(value) = price.value.filter(|v| v.is_finite() && *v > 0.0) else {
            continue;
        };
        match classify(key) {
            Some(PriceSlot::Psa(grade)) => {
                normalized.psa.insert(grade, value);
            }
            Some(PriceSlot::Cgc(grade)) => {
                normalized.cgc.insert(grade, value);
            }
            Some(PriceSlot::Bgs(grade)) => {
                normalized.bgs.insert(grade, value);
            }
            Some(PriceSlot::TcgPlayer) => normalized.tcgplayer = Some(value),
            Some(PriceSlot::EbayRaw) => normalized.ebay_raw = Some(value),
            None => log::debug!("Ignoring unknown price key {:?}", key),
        }
    }

    normalized
}
