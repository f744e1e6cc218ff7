//! Merge runner: page files + full-text archive → language shards.
//!
//! A reader thread streams records out of the JSON page files while the
//! merging consumer joins each record with its extracted text and
//! appends it to the open `.jsonl` of its language shard. Crossing the
//! rotation threshold compresses the shard file, records its digest in
//! the ledger, and advances the counter.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use indicatif::ProgressBar;
use serde::Serialize;

use halvest_core::ensure_dir;
use halvest_core::fmt_num;
use halvest_core::progress::ProgressContext;
use halvest_core::queue::{self, QueueReceiver, QueueSender, Recv};
use halvest_hal::PaperRecord;

use crate::checksum::{LEDGER_NAME, append_ledger};
use crate::counters::ShardCounters;
use crate::fulltext::FullTextArchive;
use crate::validate::validate_text;

/// In-flight records between the page reader and the merger.
const RECORD_QUEUE_CAPACITY: usize = 1024;

/// Default records per archive before rotation.
pub const SHARD_THRESHOLD: u64 = 2_000;

/// Packaging stage configuration.
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Directory of JSON page files from the fetch stage.
    pub response_dir: PathBuf,
    /// Zip archive of GROBID extractions.
    pub fulltext_zip: PathBuf,
    /// Output root; shards live in per-language subdirectories.
    pub output_dir: PathBuf,
    /// Corpus version tag baked into archive names.
    pub version: String,
    /// Records per archive before rotation.
    pub shard_threshold: u64,
}

/// Outcome counters for one packaging run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackSummary {
    /// Records read from the page files.
    pub records: u64,
    /// Records written into an archive.
    pub packed: u64,
    /// Records dropped (no text, or text failed validation).
    pub dropped: u64,
    /// Languages that received at least one record.
    pub languages: u64,
    /// Archives rotated out, drain included.
    pub archives: u64,
}

/// Metadata record with its full text, as one archive line.
#[derive(Serialize)]
struct PackedRecord<'a> {
    #[serde(flatten)]
    meta: &'a PaperRecord,
    text: &'a str,
}

/// Join every page-file record with its extracted text and shard the
/// result by language into rotated gzip archives.
pub fn run(cfg: &PackConfig, progress: &ProgressContext) -> Result<PackSummary> {
    ensure_dir(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;
    let mut texts = FullTextArchive::open(&cfg.fulltext_zip)?;

    let files = page_files(&cfg.response_dir)?;
    if files.is_empty() {
        bail!("no page files under {}", cfg.response_dir.display());
    }
    log::info!("Packing {} page files", fmt_num(files.len()));

    let pb = progress.count_bar("pack", files.len() as u64);
    let (tx, rx) = queue::bounded(RECORD_QUEUE_CAPACITY);

    let (read, merge) = thread::scope(|s| {
        let reader_pb = pb.clone();
        let producer = s.spawn(move || read_pages(files, tx, reader_pb));
        let merge = merge_records(rx, &mut texts, cfg);
        (producer.join(), merge)
    });
    pb.finish_and_clear();

    let read = match read {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("page reader thread panicked")),
    };

    match (read, merge) {
        (Ok(_), Ok(summary)) => {
            log::info!(
                "Packed {} records into {} archives ({} dropped)",
                fmt_num(summary.packed as usize),
                summary.archives,
                fmt_num(summary.dropped as usize)
            );
            Ok(summary)
        }
        (Err(read_err), merge) => {
            if let Err(merge_err) = merge {
                log::error!("Merging also failed: {merge_err:#}");
            }
            Err(read_err).context("reading page files failed")
        }
        (Ok(_), Err(merge_err)) => Err(merge_err).context("merging failed"),
    }
}

/// Sorted `*.json` page files of the fetch stage.
fn page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.json", dir.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .context("invalid page file pattern")?
        .collect::<std::result::Result<_, _>>()
        .context("reading page file directory")?;
    files.sort();
    Ok(files)
}

/// Stream every record out of the page files into the queue.
fn read_pages(
    files: Vec<PathBuf>,
    tx: QueueSender<PaperRecord>,
    pb: ProgressBar,
) -> Result<u64> {
    let mut pushed = 0u64;
    for path in files {
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let records: Vec<PaperRecord> =
            serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))?;
        for record in records {
            if tx.push(record).is_err() {
                // Merger gone; its error surfaces from the runner.
                return Ok(pushed);
            }
            pushed += 1;
        }
        pb.inc(1);
    }
    let _ = tx.finish();
    Ok(pushed)
}

/// Consume records until the sentinel, then rotate the partial shards.
fn merge_records(
    rx: QueueReceiver<PaperRecord>,
    texts: &mut FullTextArchive,
    cfg: &PackConfig,
) -> Result<PackSummary> {
    let mut summary = PackSummary::default();
    let mut counters = ShardCounters::new();

    loop {
        match rx.recv() {
            Recv::Item(record) => {
                summary.records += 1;
                let Some(bytes) = texts.read(&record.halid)? else {
                    summary.dropped += 1;
                    log::debug!("No text for {}", record.halid);
                    continue;
                };
                let text = match validate_text(&bytes) {
                    Ok(text) => text,
                    Err(issue) => {
                        summary.dropped += 1;
                        log::warn!("Dropping {}: {issue}", record.halid);
                        continue;
                    }
                };

                let dir = cfg.output_dir.join(&record.lang);
                ensure_dir(&dir).with_context(|| format!("creating {}", dir.display()))?;
                let shard = counters.shard(&record.lang, &dir);
                let stem = format!("{}{}-{}", record.lang, cfg.version, shard.counter);
                append_record(&dir.join(format!("{stem}.jsonl")), &record, text)?;
                shard.pending += 1;
                summary.packed += 1;

                if shard.pending >= cfg.shard_threshold {
                    rotate(&dir, &stem)?;
                    shard.counter += 1;
                    shard.pending = 0;
                    summary.archives += 1;
                }
            }
            Recv::End => {
                summary.archives += drain(&counters, cfg)?;
                summary.languages = counters.iter().count() as u64;
                return Ok(summary);
            }
            Recv::Aborted => {
                // Reader failed; finished archives stay, the open
                // .jsonl files are left for the rerun to continue.
                return Ok(summary);
            }
        }
    }
}

/// Append one merged record as a JSON line.
fn append_record(path: &Path, record: &PaperRecord, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    serde_json::to_writer(&mut file, &PackedRecord { meta: record, text })
        .with_context(|| format!("writing {}", path.display()))?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Compress a full shard file, ledger it, and remove the original.
fn rotate(dir: &Path, stem: &str) -> Result<()> {
    let jsonl = dir.join(format!("{stem}.jsonl"));
    let gz = dir.join(format!("{stem}.jsonl.gz"));
    let ledger = dir.join(LEDGER_NAME);

    let mut input = File::open(&jsonl).with_context(|| format!("opening {}", jsonl.display()))?;
    let mut encoder = GzEncoder::new(
        File::create(&gz).with_context(|| format!("creating {}", gz.display()))?,
        Compression::default(),
    );
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    std::fs::remove_file(&jsonl)?;

    append_ledger(&ledger, &gz).with_context(|| format!("ledgering {}", gz.display()))?;
    log::info!("Packed {}", gz.display());
    Ok(())
}

/// Rotate every shard with a partial batch after a clean drain.
fn drain(counters: &ShardCounters, cfg: &PackConfig) -> Result<u64> {
    let mut rotated = 0;
    for (lang, state) in counters.iter() {
        if state.pending == 0 {
            continue;
        }
        let dir = cfg.output_dir.join(lang);
        let stem = format!("{}{}-{}", lang, cfg.version, state.counter);
        if !dir.join(format!("{stem}.jsonl")).is_file() {
            log::warn!("Shard file for {stem} vanished before the final rotation");
            continue;
        }
        rotate(&dir, &stem)?;
        rotated += 1;
    }
    Ok(rotated)
}
