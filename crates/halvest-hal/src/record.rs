//! Paper metadata records extracted from TEI search responses.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One open-access paper as written to the page files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Canonical deposit identifier (trailing segment of the HAL idno).
    pub halid: String,
    /// ISO-639 language code.
    pub lang: String,
    /// HAL domain classification codes.
    pub domain: Vec<String>,
    /// Production year (`"1"` when the date cannot be parsed).
    pub year: String,
    pub title: String,
    pub authors: Vec<AuthorRecord>,
    /// Direct PDF link (first author-submitted file of the deposit).
    pub url: String,
    /// Crawl time, `%Y/%m/%d %H:%M:%S`.
    pub timestamp: String,
}

/// One author of a deposit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    #[serde(default)]
    pub affiliations: Vec<String>,
    /// External identifier kind → value (ORCID, idHAL, email, ...).
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
}

/// Trailing segment of a HAL identifier after the last hyphen.
///
/// `"hal-04286657"` → `"04286657"`; an id without a hyphen passes
/// through unchanged.
pub fn canonical_halid(raw: &str) -> &str {
    match raw.rfind('-') {
        Some(i) => &raw[i + 1..],
        None => raw,
    }
}

/// Extract a paper's production year.
///
/// The date format is always `%Y-%m-%d` but the precision is mixed
/// (`2023-05-12`, `2023-05`, `2023`). Unparseable dates fall back to
/// `"1"`.
pub fn extract_year(date: &str) -> String {
    if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return d.format("%Y").to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d") {
        return d.format("%Y").to_string();
    }
    if let Ok(year) = date.parse::<i32>() {
        if (1..=9999).contains(&year) {
            return year.to_string();
        }
    }
    log::warn!("Error parsing date: {date}");
    "1".to_string()
}
