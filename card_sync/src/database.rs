//! SQLite persistence for cards and sets
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Cards are stored as their JSON record plus the columns needed for lookup
//! and ordering.

use crate::error::SyncResult;
use crate::store::{CardStore, Page};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tcg_common::{CardRecord, CatalogASet};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `cards`: one row per card of either catalog, keyed by card id
/// - `sets`: Catalog A set list
pub fn init_schema(conn: &Connection) -> SyncResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            set_id TEXT NOT NULL,
            source TEXT NOT NULL,
            card_number TEXT NOT NULL,
            record TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_cards_set ON cards(set_id);

        CREATE TABLE IF NOT EXISTS sets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            cross_ref_code TEXT,
            release_date TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sets_release_date ON sets(release_date);
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Insert or replace a card
pub fn upsert_card(conn: &Connection, card: &CardRecord) -> SyncResult<()> {
    let record = serde_json::to_string(card)?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO cards (id, set_id, source, card_number, record, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
    )?;
    stmt.execute(params![
        &card.id,
        &card.set_id,
        card.source.as_str(),
        &card.card_number,
        record
    ])?;
    Ok(())
}

/// Get a card by id, optionally restricted to a set partition
///
/// Ids compare case-insensitively, matching how cache keys fold case.
pub fn get_card(
    conn: &Connection,
    id: &str,
    partition: Option<&str>,
) -> SyncResult<Option<CardRecord>> {
    let record: Option<String> = match partition {
        Some(set_id) => conn
            .query_row(
                "SELECT record FROM cards
                 WHERE id = ?1 COLLATE NOCASE AND set_id = ?2 COLLATE NOCASE",
                params![id, set_id],
                |row| row.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT record FROM cards WHERE id = ?1 COLLATE NOCASE",
                params![id],
                |row| row.get(0),
            )
            .optional()?,
    };

    match record {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Count cards stored for a set
pub fn count_cards_in_set(conn: &Connection, set_id: &str) -> SyncResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cards WHERE set_id = ?1",
        params![set_id],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// One page of a set's cards in collector number order
///
/// `page` is 1-based. Counts come from the whole set, not the page.
pub fn cards_by_set(
    conn: &Connection,
    set_id: &str,
    page: u32,
    page_size: u32,
) -> SyncResult<Page<CardRecord>> {
    let total = count_cards_in_set(conn, set_id)?;
    let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

    let mut stmt = conn.prepare_cached(
        "SELECT record FROM cards
         WHERE set_id = ?1
         ORDER BY CAST(card_number AS INTEGER), card_number, id
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows: Vec<String> = stmt
        .query_map(params![set_id, i64::from(page_size), offset], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let items = rows
        .iter()
        .map(|json| serde_json::from_str(json))
        .collect::<serde_json::Result<Vec<CardRecord>>>()?;

    Ok(Page::new(items, total, page, page_size))
}

/// Insert or replace sets in one transaction
pub fn upsert_sets(conn: &mut Connection, sets: &[CatalogASet]) -> SyncResult<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO sets (id, name, cross_ref_code, release_date, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        )?;
        for set in sets {
            stmt.execute(params![
                &set.id,
                &set.name,
                &set.cross_ref_code,
                set.release_date.format(DATE_FORMAT).to_string(),
            ])?;
        }
    }
    tx.commit()?;

    log::info!("Upserted {} sets into database", sets.len());
    Ok(sets.len())
}

type SetRow = (String, String, Option<String>, String);

fn row_to_set(row: &rusqlite::Row<'_>) -> rusqlite::Result<SetRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn parse_set((id, name, cross_ref_code, release_date): SetRow) -> Option<CatalogASet> {
    match NaiveDate::parse_from_str(&release_date, DATE_FORMAT) {
        Ok(release_date) => Some(CatalogASet {
            id,
            name,
            cross_ref_code,
            release_date,
        }),
        Err(_) => {
            log::warn!("Skipping set {} with unreadable release date {:?}", id, release_date);
            None
        }
    }
}

/// Sets released on or after `since` (all sets when `None`), newest first
pub fn sets_released_since(
    conn: &Connection,
    since: Option<NaiveDate>,
) -> SyncResult<Vec<CatalogASet>> {
    let since = since
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default();
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, cross_ref_code, release_date FROM sets
         WHERE release_date >= ?1
         ORDER BY release_date DESC, id",
    )?;
    let rows = stmt
        .query_map(params![since], row_to_set)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().filter_map(parse_set).collect())
}

/// Secondary form of the set queries: a plain scan, filtered and sorted here
///
/// Rows that cannot be decoded are skipped instead of failing the read.
pub fn scan_sets(conn: &Connection, since: Option<NaiveDate>) -> SyncResult<Vec<CatalogASet>> {
    let mut stmt = conn.prepare("SELECT id, name, cross_ref_code, release_date FROM sets")?;
    let mut sets: Vec<CatalogASet> = stmt
        .query_map([], row_to_set)?
        .filter_map(|row| match row {
            Ok(row) => parse_set(row),
            Err(e) => {
                log::warn!("Skipping unreadable set row: {}", e);
                None
            }
        })
        .filter(|set| since.map_or(true, |since| set.release_date >= since))
        .collect();
    sets.sort_by(|a, b| b.release_date.cmp(&a.release_date).then_with(|| a.id.cmp(&b.id)));
    Ok(sets)
}

/// Primary query, then the scan, then nothing
fn sets_with_fallback(conn: &Connection, since: Option<NaiveDate>) -> Vec<CatalogASet> {
    match sets_released_since(conn, since) {
        Ok(sets) => sets,
        Err(e) => {
            log::warn!("Set query failed, falling back to a table scan: {}", e);
            scan_sets(conn, since).unwrap_or_else(|e| {
                log::error!("Set scan failed, returning no sets: {}", e);
                Vec::new()
            })
        }
    }
}

/// SQLite-backed [`CardStore`] sharing one connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and its schema
    pub fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created directory: {}", parent.display());
            }
        }
        let conn = Connection::open(path)?;
        log::info!("Opened database: {}", path.display());
        Self::from_connection(conn)
    }

    pub fn in_memory() -> SyncResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CardStore for SqliteStore {
    async fn get_card(&self, id: &str, partition: Option<&str>) -> SyncResult<Option<CardRecord>> {
        get_card(&self.conn(), id, partition)
    }

    async fn cards_by_set(
        &self,
        set_id: &str,
        page: u32,
        page_size: u32,
    ) -> SyncResult<Page<CardRecord>> {
        cards_by_set(&self.conn(), set_id, page, page_size)
    }

    async fn upsert_card(&self, card: &CardRecord) -> SyncResult<()> {
        upsert_card(&self.conn(), card)
    }

    async fn upsert_sets(&self, sets: &[CatalogASet]) -> SyncResult<usize> {
        upsert_sets(&mut self.conn(), sets)
    }

    async fn all_sets(&self) -> Vec<CatalogASet> {
        sets_with_fallback(&self.conn(), None)
    }

    async fn current_sets(&self, since: NaiveDate) -> Vec<CatalogASet> {
        sets_with_fallback(&self.conn(), Some(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcg_common::CardSource;

    /// Create an in-memory database for testing
    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn card(id: &str, set_id: &str, number: &str) -> CardRecord {
        CardRecord {
            id: id.to_string(),
            set_id: set_id.to_string(),
            set_code: set_id.to_uppercase(),
            card_name: format!("Card {}", number),
            card_number: number.to_string(),
            rarity: None,
            cross_catalog_id: None,
            pricing: None,
            enhanced_pricing: None,
            images: None,
            pricing_last_updated: None,
            source: CardSource::CatalogA,
        }
    }

    fn set(id: &str, released: &str) -> CatalogASet {
        CatalogASet {
            id: id.to_string(),
            name: id.to_uppercase(),
            cross_ref_code: None,
            release_date: NaiveDate::parse_from_str(released, DATE_FORMAT).unwrap(),
        }
    }

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(tables.contains(&"cards".to_string()));
        assert!(tables.contains(&"sets".to_string()));
    }

    #[test]
    fn upsert_card_replaces_existing() {
        let conn = test_db();
        let mut pikachu = card("sv1-76", "sv1", "76");
        upsert_card(&conn, &pikachu).unwrap();

        pikachu.cross_catalog_id = Some("9001".to_string());
        upsert_card(&conn, &pikachu).unwrap();

        let stored = get_card(&conn, "sv1-76", Some("sv1")).unwrap().unwrap();
        assert_eq!(stored.cross_catalog_id.as_deref(), Some("9001"));
        assert_eq!(count_cards_in_set(&conn, "sv1").unwrap(), 1);
    }

    #[test]
    fn get_card_respects_partition() {
        let conn = test_db();
        upsert_card(&conn, &card("sv1-76", "sv1", "76")).unwrap();

        assert!(get_card(&conn, "sv1-76", None).unwrap().is_some());
        assert!(get_card(&conn, "sv1-76", Some("sv2")).unwrap().is_none());
        assert!(get_card(&conn, "sv1-77", Some("sv1")).unwrap().is_none());
    }

    #[test]
    fn get_card_ignores_id_case() {
        let conn = test_db();
        upsert_card(&conn, &card("sv1-TG01", "sv1", "TG01")).unwrap();

        let stored = get_card(&conn, "sv1-tg01", Some("SV1")).unwrap().unwrap();
        assert_eq!(stored.id, "sv1-TG01");
    }

    #[test]
    fn cards_by_set_pages_in_number_order() {
        let conn = test_db();
        for number in ["10", "2", "1", "GG01"] {
            upsert_card(&conn, &card(&format!("sv1-{}", number), "sv1", number)).unwrap();
        }
        upsert_card(&conn, &card("sv2-1", "sv2", "1")).unwrap();

        let first = cards_by_set(&conn, "sv1", 1, 3).unwrap();
        let numbers: Vec<&str> = first.items.iter().map(|c| c.card_number.as_str()).collect();
        assert_eq!(numbers, vec!["GG01", "1", "2"]);
        assert_eq!(first.total_count, 4);
        assert_eq!(first.total_pages, 2);

        let second = cards_by_set(&conn, "sv1", 2, 3).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].card_number, "10");
    }

    #[test]
    fn large_page_returns_whole_set() {
        let conn = test_db();
        for n in 1..=180 {
            upsert_card(&conn, &card(&format!("sv1-{}", n), "sv1", &n.to_string())).unwrap();
        }

        let page = cards_by_set(&conn, "sv1", 1, 500).unwrap();
        assert_eq!(page.items.len(), 180);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn sets_are_listed_newest_first() {
        let mut conn = test_db();
        upsert_sets(
            &mut conn,
            &[set("base1", "1999-01-09"), set("sv1", "2023-03-31"), set("sv2", "2023-06-09")],
        )
        .unwrap();

        let all = sets_released_since(&conn, None).unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["sv2", "sv1", "base1"]);

        let since = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        let recent = sets_released_since(&conn, Some(since)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "sv2");
    }

    #[test]
    fn scan_skips_unreadable_rows() {
        let mut conn = test_db();
        upsert_sets(&mut conn, &[set("sv1", "2023-03-31")]).unwrap();
        conn.execute(
            "INSERT INTO sets (id, name, release_date) VALUES ('bad', 'Bad', 'someday')",
            [],
        )
        .unwrap();

        let sets = scan_sets(&conn, None).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].id, "sv1");
    }

    #[test]
    fn set_reads_fall_back_to_scan() {
        let conn = test_db();
        conn.execute_batch(
            "DROP TABLE sets;
             CREATE TABLE sets (id TEXT, name TEXT, cross_ref_code TEXT, release_date TEXT);
             INSERT INTO sets VALUES ('sv1', 'Scarlet & Violet', 'SVI', '2023-03-31');
             INSERT INTO sets VALUES ('odd', NULL, NULL, '2023-01-01');",
        )
        .unwrap();

        // The NULL name breaks the primary query; the scan skips that row
        assert!(sets_released_since(&conn, None).is_err());
        assert_eq!(sets_with_fallback(&conn, None).len(), 1);

        conn.execute_batch("DROP TABLE sets;").unwrap();
        assert!(sets_with_fallback(&conn, None).is_empty());
    }

    #[tokio::test]
    async fn store_saves_cards_item_by_item() {
        let store = SqliteStore::in_memory().unwrap();
        let cards = vec![card("sv1-1", "sv1", "1"), card("sv1-2", "sv1", "2")];

        let summary = store.save_cards(&cards).await;

        assert_eq!(summary.saved, 2);
        assert_eq!(summary.failed, 0);
        let page = store.cards_by_set("sv1", 1, 10).await.unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cards.db");
        SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
