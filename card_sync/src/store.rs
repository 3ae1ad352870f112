//! Persistent card store contract
//!
//! The card service only talks to this trait; [`crate::database::SqliteStore`]
//! is the shipped implementation.

use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tcg_common::{CardRecord, CatalogASet};

/// One page of a larger result, with counts taken from the full result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, page_number: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            u32::try_from(total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            total_count,
            page_number,
            page_size,
            total_pages,
        }
    }
}

/// Outcome of an item-by-item batch save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub failed: usize,
}

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Card by id; Catalog A ids pass their embedded set id as partition
    async fn get_card(&self, id: &str, partition: Option<&str>) -> SyncResult<Option<CardRecord>>;

    /// `page` is 1-based
    async fn cards_by_set(
        &self,
        set_id: &str,
        page: u32,
        page_size: u32,
    ) -> SyncResult<Page<CardRecord>>;

    async fn upsert_card(&self, card: &CardRecord) -> SyncResult<()>;

    /// Save cards one at a time.
    ///
    /// There is no atomicity across records: a failure is logged and the
    /// remaining cards are still saved. Re-running is safe.
    async fn save_cards(&self, cards: &[CardRecord]) -> SaveSummary {
        let mut summary = SaveSummary::default();
        for card in cards {
            match self.upsert_card(card).await {
                Ok(()) => summary.saved += 1,
                Err(e) => {
                    log::warn!("Failed to save card {}: {}", card.id, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn upsert_sets(&self, sets: &[CatalogASet]) -> SyncResult<usize>;

    /// Every stored set, newest first; empty when nothing can be read
    async fn all_sets(&self) -> Vec<CatalogASet>;

    /// Sets released on or after `since`, newest first; empty when nothing can be read
    async fn current_sets(&self, since: NaiveDate) -> Vec<CatalogASet>;
}
