//! Set definitions for both catalogs

use crate::error::{CommonError, CommonResult};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Catalog B language tag for English-language sets
pub const ENGLISH: &str = "ENGLISH";

/// A set as listed by Catalog A (Pokémon TCG API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogASet {
    pub id: String,
    pub name: String,
    /// Short code shared with Catalog B for some sets (`ptcgoCode`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_ref_code: Option<String>,
    pub release_date: NaiveDate,
}

/// A set as listed by Catalog B (PokeData)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogBSet {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub language: String,
    pub release_date: NaiveDate,
}

impl CatalogBSet {
    /// Only English sets take part in set matching
    pub fn is_english(&self) -> bool {
        self.language == ENGLISH
    }
}

/// Parse a Catalog A release date (`2023/03/31`).
pub fn parse_catalog_a_date(value: &str) -> CommonResult<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| CommonError::InvalidDate {
            value: value.to_string(),
            expected: "YYYY/MM/DD",
        })
}

/// Parse a Catalog B release date (`Fri, 31 Mar 2023 00:00:00 GMT`).
pub fn parse_catalog_b_date(value: &str) -> CommonResult<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Ok(dt.date_naive());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CommonError::InvalidDate {
        value: value.to_string(),
        expected: "RFC 2822",
    })
}
