//! Cursor-paginated crawl client for the HAL search API.
//!
//! The client owns the cursor loop: fetch a page, read its pagination
//! header, hand the raw body to the formatter through the sentinel
//! queue, advance the cursor. It never parses records itself; that work
//! belongs to the consumer so the network stays saturated.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use halvest_core::http::{FetchError, get_text};
use halvest_core::queue::QueueSender;

use crate::config::HalConfig;
use crate::tei::{ProtocolError, parse_page_head};

/// Documents requested per page. The API caps larger values anyway.
const PAGE_ROWS: u32 = 500;

/// Everything the API needs kept verbatim in a request URL: query
/// operators, the path, and the base64 cursor alphabet.
const URL_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'?')
    .remove(b'/')
    .remove(b':')
    .remove(b'&')
    .remove(b'=')
    .remove(b'*')
    .remove(b'+')
    .remove(b'-')
    .remove(b'_')
    .remove(b'[')
    .remove(b']')
    .remove(b'.')
    .remove(b'~');

/// Fatal crawl failure. The cursor cannot advance past a failed or
/// unparseable page, so the whole crawl stops here.
#[derive(Debug)]
pub enum CrawlError {
    Fetch(FetchError),
    Protocol(ProtocolError),
}

impl std::fmt::Display for CrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "page fetch failed: {e}"),
            Self::Protocol(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<FetchError> for CrawlError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<ProtocolError> for CrawlError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// Counters reported by a finished crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Total matches the API reported for the query.
    pub total_matches: u64,
    /// Pages handed to the formatter.
    pub pages: u64,
    /// Documents across those pages.
    pub records: u64,
}

/// Cursor-paginated crawl over one query.
pub struct CrawlClient {
    cfg: HalConfig,
}

impl CrawlClient {
    pub fn new(cfg: HalConfig) -> Self {
        Self { cfg }
    }

    /// Run the crawl, pushing each raw response page into `pages`.
    ///
    /// Terminates when the API returns an empty page (the cursor
    /// protocol's end signal) or when the consumer goes away, in which
    /// case the crawl stops quietly with the stats gathered so far. Any
    /// fetch or protocol error aborts without sending the sentinel.
    pub fn crawl(&self, pages: QueueSender<String>) -> Result<CrawlStats, CrawlError> {
        let mut stats = CrawlStats::default();
        let mut cursor = "*".to_string();

        let mut body = get_text(&self.page_url(&cursor))?;
        let mut head = parse_page_head(&body)?;
        stats.total_matches = head.total_matches;
        log::info!(
            "Fetching {} documents from {}",
            head.total_matches,
            self.cfg.base_url
        );

        while head.returned != 0 {
            if pages.push(body).is_err() {
                // Consumer gone: its error will surface from the runner.
                return Ok(stats);
            }
            stats.pages += 1;
            stats.records += head.returned;

            let next = head.next_cursor.ok_or_else(|| {
                ProtocolError::from_missing_cursor(stats.pages)
            })?;
            cursor = next;

            body = get_text(&self.page_url(&cursor))?;
            head = parse_page_head(&body)?;
        }

        let _ = pages.finish();
        log::info!(
            "Crawl done: {} pages, {} documents",
            stats.pages,
            stats.records
        );
        Ok(stats)
    }

    /// Build the request URL for one cursor position.
    fn page_url(&self, cursor: &str) -> String {
        let raw = format!(
            "{}/search/?q={}{}&fq=openAccess_bool:true&wt=xml-tei&sort=docid asc&rows={}&cursorMark={}",
            self.cfg.base_url,
            self.cfg.query,
            self.date_filter(),
            PAGE_ROWS,
            cursor
        );
        utf8_percent_encode(&raw, URL_KEEP).to_string()
    }

    /// Optional `dateLastIndexed` window. Open bounds render as `*`.
    fn date_filter(&self) -> String {
        if self.cfg.from_date.is_none() && self.cfg.to_date.is_none() {
            return String::new();
        }
        let from = match &self.cfg.from_date {
            Some(date) => format!(
                "{date}T{}Z",
                self.cfg.from_hour.as_deref().unwrap_or("00:00:00")
            ),
            None => "*".to_string(),
        };
        let to = match &self.cfg.to_date {
            Some(date) => format!(
                "{date}T{}Z",
                self.cfg.to_hour.as_deref().unwrap_or("00:00:00")
            ),
            None => "*".to_string(),
        };
        format!("&fq=dateLastIndexed_tdate:[{from} TO {to}]")
    }
}

impl ProtocolError {
    fn from_missing_cursor(page: u64) -> Self {
        Self {
            message: format!("page {page} returned documents but no next cursor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(cfg: HalConfig) -> CrawlClient {
        CrawlClient::new(cfg)
    }

    #[test]
    fn url_spaces_encoded_operators_kept() {
        let c = client(HalConfig {
            query: "text_fulltext:(deep learning)".to_string(),
            ..HalConfig::default()
        });
        let url = c.page_url("*");
        assert!(url.contains("sort=docid%20asc"));
        assert!(url.contains("cursorMark=*"));
        assert!(url.contains("q=text_fulltext:%28deep%20learning%29"));
        assert!(url.contains("fq=openAccess_bool:true"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn url_keeps_cursor_alphabet() {
        let c = client(HalConfig::default());
        let url = c.page_url("AoEp+MjM0/NTY3=");
        assert!(url.contains("cursorMark=AoEp+MjM0/NTY3="));
    }

    #[test]
    fn no_dates_no_filter() {
        let c = client(HalConfig::default());
        assert_eq!(c.date_filter(), "");
    }

    #[test]
    fn both_dates_with_default_hours() {
        let c = client(HalConfig {
            from_date: Some("2024-01-01".to_string()),
            to_date: Some("2024-02-01".to_string()),
            ..HalConfig::default()
        });
        assert_eq!(
            c.date_filter(),
            "&fq=dateLastIndexed_tdate:[2024-01-01T00:00:00Z TO 2024-02-01T00:00:00Z]"
        );
    }

    #[test]
    fn open_lower_bound_renders_star() {
        let c = client(HalConfig {
            to_date: Some("2024-02-01".to_string()),
            to_hour: Some("12:00:00".to_string()),
            ..HalConfig::default()
        });
        assert_eq!(
            c.date_filter(),
            "&fq=dateLastIndexed_tdate:[* TO 2024-02-01T12:00:00Z]"
        );
    }

    #[test]
    fn explicit_from_hour_used() {
        let c = client(HalConfig {
            from_date: Some("2024-01-01".to_string()),
            from_hour: Some("06:30:00".to_string()),
            ..HalConfig::default()
        });
        assert!(c.date_filter().contains("2024-01-01T06:30:00Z TO *"));
    }
}
