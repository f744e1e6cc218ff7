//! Crawl configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a HAL crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HalConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Solr query string (already in HAL query syntax).
    pub query: String,
    /// Lower bound on `dateLastIndexed`, `%Y-%m-%d`. `None` means open.
    pub from_date: Option<String>,
    /// Hour appended to `from_date`, `%H:%M:%S`. Defaults to midnight.
    pub from_hour: Option<String>,
    /// Upper bound on `dateLastIndexed`, `%Y-%m-%d`. `None` means open.
    pub to_date: Option<String>,
    /// Hour appended to `to_date`. Defaults to end of day.
    pub to_hour: Option<String>,
    /// Directory receiving the JSON page files.
    pub response_dir: PathBuf,
    /// Records accumulated before a page file is written.
    pub page_threshold: usize,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.archives-ouvertes.fr".to_string(),
            query: "*".to_string(),
            from_date: None,
            from_hour: None,
            to_date: None,
            to_hour: None,
            response_dir: PathBuf::from("./data/responses"),
            page_threshold: 10_000,
        }
    }
}
