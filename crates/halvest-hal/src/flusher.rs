//! Batched writer for JSON page files.
//!
//! Records accumulate in memory and are written out as numbered page
//! files once the batch crosses the threshold. File names carry the
//! crawl date and a counter starting at 1, so a crawl never appends to
//! or interleaves with files from a previous run's numbering.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::record::PaperRecord;

/// Default batch size before a page file is written.
pub const PAGE_THRESHOLD: usize = 10_000;

/// Accumulates records and writes them as `{date}_{counter}.json`.
pub struct PageFlusher {
    dir: PathBuf,
    threshold: usize,
    date: String,
    counter: u32,
    batch: Vec<PaperRecord>,
    records_written: u64,
    files_written: u64,
}

impl PageFlusher {
    pub fn new(dir: &Path, threshold: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            threshold,
            date: Local::now().format("%Y-%m-%d").to_string(),
            counter: 0,
            batch: Vec::new(),
            records_written: 0,
            files_written: 0,
        }
    }

    /// Add one page's worth of records, flushing if the batch is full.
    pub fn save(&mut self, records: Vec<PaperRecord>) -> io::Result<()> {
        self.batch.extend(records);
        if self.batch.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the whole batch (which may exceed the threshold) as the
    /// next numbered page file.
    fn flush(&mut self) -> io::Result<()> {
        self.counter += 1;
        let path = self.dir.join(format!("{}_{}.json", self.date, self.counter));
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &self.batch)?;
        log::debug!(
            "Wrote {} records to {}",
            self.batch.len(),
            path.display()
        );
        self.records_written += self.batch.len() as u64;
        self.files_written += 1;
        self.batch.clear();
        Ok(())
    }

    /// Page files written so far.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    /// Flush the final partial batch, if any, and report totals as
    /// `(records, files)`.
    pub fn finish(mut self) -> io::Result<(u64, u64)> {
        if !self.batch.is_empty() {
            self.flush()?;
        }
        Ok((self.records_written, self.files_written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PaperRecord;

    fn record(halid: &str) -> PaperRecord {
        PaperRecord {
            halid: halid.to_string(),
            lang: "en".to_string(),
            domain: vec![],
            year: "2023".to_string(),
            title: "T".to_string(),
            authors: vec![],
            url: "https://hal.science/x.pdf".to_string(),
            timestamp: "2024/01/01 00:00:00".to_string(),
        }
    }

    fn page_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn threshold_triggers_numbered_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut flusher = PageFlusher::new(dir.path(), 3);
        flusher
            .save(vec![record("1"), record("2"), record("3"), record("4")])
            .unwrap();

        let files = page_files(dir.path());
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_1.json"), "unexpected name {name}");

        // The whole batch goes out, even past the threshold.
        let body = std::fs::read_to_string(&files[0]).unwrap();
        let back: Vec<PaperRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(back.len(), 4);
    }

    #[test]
    fn finish_flushes_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut flusher = PageFlusher::new(dir.path(), 3);
        flusher.save(vec![record("1"), record("2"), record("3")]).unwrap();
        flusher.save(vec![record("4")]).unwrap();
        let (records, files) = flusher.finish().unwrap();

        assert_eq!(records, 4);
        assert_eq!(files, 2);
        let files = page_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(
            files[1]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_2.json")
        );
    }

    #[test]
    fn finish_with_empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let flusher = PageFlusher::new(dir.path(), 3);
        let (records, files) = flusher.finish().unwrap();
        assert_eq!((records, files), (0, 0));
        assert!(page_files(dir.path()).is_empty());
    }
}
