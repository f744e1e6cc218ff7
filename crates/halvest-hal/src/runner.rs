//! Fetch stage runner: wires the crawl producer to the formatting
//! consumer over the sentinel queue and reconciles their outcomes.

use std::path::Path;
use std::thread;

use anyhow::{Context, anyhow};

use halvest_core::ensure_dir;
use halvest_core::queue::{self, QueueReceiver, Recv};

use crate::client::CrawlClient;
use crate::config::HalConfig;
use crate::flusher::PageFlusher;
use crate::tei::{self, RecordOutcome};

/// In-flight raw pages between crawl and formatter. Small on purpose:
/// each page holds up to 500 documents of XML.
const PAGE_QUEUE_CAPACITY: usize = 8;

/// Counters reported by a finished fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSummary {
    /// Total matches the API reported for the query.
    pub total_matches: u64,
    /// Response pages crawled.
    pub pages: u64,
    /// Documents parsed out of those pages.
    pub records_parsed: u64,
    /// Documents that passed validation and were written out.
    pub records_kept: u64,
    /// Documents dropped by a validation predicate.
    pub records_dropped: u64,
    /// JSON page files written.
    pub page_files: u64,
}

/// Crawl the configured query and write validated records as JSON page
/// files under `cfg.response_dir`.
pub fn fetch(cfg: &HalConfig) -> anyhow::Result<FetchSummary> {
    ensure_dir(&cfg.response_dir)
        .with_context(|| format!("creating {}", cfg.response_dir.display()))?;

    let client = CrawlClient::new(cfg.clone());
    let (tx, rx) = queue::bounded(PAGE_QUEUE_CAPACITY);

    let (crawl, format) = thread::scope(|s| {
        let producer = s.spawn(move || client.crawl(tx));
        let format = format_pages(rx, &cfg.response_dir, cfg.page_threshold);
        (producer.join(), format)
    });

    let crawl = match crawl {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("crawl thread panicked")),
    };

    match (crawl, format) {
        (Ok(stats), Ok(fmt)) => Ok(FetchSummary {
            total_matches: stats.total_matches,
            pages: stats.pages,
            records_parsed: fmt.parsed,
            records_kept: fmt.kept,
            records_dropped: fmt.dropped,
            page_files: fmt.files,
        }),
        (Err(crawl_err), format) => {
            if let Err(fmt_err) = format {
                log::error!("Formatting also failed: {fmt_err:#}");
            }
            Err(crawl_err).context("crawl failed")
        }
        (Ok(_), Err(fmt_err)) => Err(fmt_err).context("formatting failed"),
    }
}

#[derive(Debug, Default)]
struct FormatOutcome {
    parsed: u64,
    kept: u64,
    dropped: u64,
    files: u64,
}

/// Consume raw pages until the sentinel: parse, validate, flush.
///
/// On producer abort the already-flushed page files are kept and the
/// in-memory batch is discarded; the producer's error is the one the
/// runner reports.
fn format_pages(
    rx: QueueReceiver<String>,
    dir: &Path,
    threshold: usize,
) -> anyhow::Result<FormatOutcome> {
    let mut flusher = PageFlusher::new(dir, threshold);
    let mut out = FormatOutcome::default();

    loop {
        match rx.recv() {
            Recv::Item(body) => {
                let outcomes = tei::parse_records(&body).context("parsing response page")?;
                out.parsed += outcomes.len() as u64;
                let mut records = Vec::with_capacity(outcomes.len());
                for outcome in outcomes {
                    match outcome {
                        RecordOutcome::Keep(record) => records.push(record),
                        RecordOutcome::Drop(reason) => {
                            out.dropped += 1;
                            log::debug!("Dropping document: {reason}");
                        }
                    }
                }
                out.kept += records.len() as u64;
                flusher.save(records).context("writing page file")?;
            }
            Recv::End => {
                let (_, files) = flusher.finish().context("writing final page file")?;
                out.files = files;
                return Ok(out);
            }
            Recv::Aborted => {
                out.files = flusher.files_written();
                return Ok(out);
            }
        }
    }
}
