//! Bounded-concurrency download pool.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

use halvest_core::http::get_bytes;
use halvest_core::progress::ProgressContext;
use halvest_core::semaphore::Semaphore;
use halvest_core::{ensure_dir, fmt_num};

use crate::task::DownloadTask;

/// Download stage configuration.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory receiving `{halid}.pdf` files.
    pub pdf_dir: PathBuf,
    /// Simultaneous in-flight requests.
    pub concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("./data/pdfs"),
            concurrency: 8,
        }
    }
}

/// Outcome counters for one download run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadSummary {
    pub saved: usize,
    pub skipped: usize,
}

/// Fetch every task's PDF, writing `{halid}.pdf` as soon as its body
/// arrives.
///
/// The semaphore gates the network fetch only, so file writes overlap
/// with in-flight requests. A failed or empty fetch skips the task; a
/// failed write aborts the run, since losing bodies already paid for
/// would silently corrupt the corpus.
pub fn run(
    tasks: &[DownloadTask],
    config: &DownloadConfig,
    progress: &ProgressContext,
) -> Result<DownloadSummary> {
    let start = Instant::now();
    ensure_dir(&config.pdf_dir)
        .with_context(|| format!("creating {}", config.pdf_dir.display()))?;

    log::info!(
        "Downloading {} PDFs with {} workers",
        fmt_num(tasks.len()),
        config.concurrency
    );

    let pb = progress.count_bar("download", tasks.len() as u64);
    let gate = Semaphore::new(config.concurrency);
    let saved = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrency.max(1))
        .build()
        .context("Failed to create thread pool")?;

    pool.install(|| {
        tasks.par_iter().try_for_each(|task| -> Result<()> {
            let body = {
                let _permit = gate.acquire();
                get_bytes(&task.url)
            };
            match body {
                Ok(bytes) if bytes.is_empty() => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Empty body for {} at {}", task.halid, task.url);
                }
                Ok(bytes) => {
                    let path = config.pdf_dir.join(format!("{}.pdf", task.halid));
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    saved.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Couldn't access {} at {}: {e}", task.halid, task.url);
                }
            }
            pb.inc(1);
            Ok(())
        })
    })?;

    pb.finish_and_clear();
    let summary = DownloadSummary {
        saved: saved.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
    };
    log::info!(
        "Downloads: {} saved, {} skipped in {:.1}s",
        fmt_num(summary.saved),
        fmt_num(summary.skipped),
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}
