//! Download task list built from the JSON page files.

use std::path::Path;

use anyhow::{Context, Result, bail};

use halvest_hal::PaperRecord;

/// One PDF to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub halid: String,
    pub url: String,
}

/// Collect every record's PDF link from the `*.json` page files under
/// `response_dir`. An empty task list is an error: it means the fetch
/// stage has not run (or wrote somewhere else).
pub fn load_tasks(response_dir: &Path) -> Result<Vec<DownloadTask>> {
    let pattern = format!("{}/*.json", response_dir.display());
    let mut tasks = Vec::new();

    for entry in glob::glob(&pattern).context("invalid page file pattern")? {
        let path = entry.context("reading page file directory")?;
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let records: Vec<PaperRecord> = serde_json::from_str(&body)
            .with_context(|| format!("parsing {}", path.display()))?;
        tasks.extend(records.into_iter().map(|r| DownloadTask {
            halid: r.halid,
            url: r.url,
        }));
    }

    if tasks.is_empty() {
        bail!("no records found under {}", response_dir.display());
    }
    Ok(tasks)
}
