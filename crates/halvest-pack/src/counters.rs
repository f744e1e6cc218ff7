//! Per-language shard counters with on-disk recovery.

use std::collections::HashMap;
use std::path::Path;

/// Rotation state of one language shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardState {
    /// Index of the archive currently being filled.
    pub counter: u32,
    /// Records appended to the open `.jsonl` since the last rotation.
    pub pending: u64,
}

/// Language → shard state, recovered lazily from the shard directory.
#[derive(Debug, Default)]
pub struct ShardCounters {
    shards: HashMap<String, ShardState>,
}

impl ShardCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shard state for `lang`, recovering the counter from the
    /// archives already in `dir` on first touch.
    ///
    /// Recovery continues the numbering: the next archive index is one
    /// past the highest finished archive, never a reused or reset one.
    pub fn shard(&mut self, lang: &str, dir: &Path) -> &mut ShardState {
        self.shards.entry(lang.to_string()).or_insert_with(|| ShardState {
            counter: recover_counter(dir),
            pending: 0,
        })
    }

    /// Languages touched so far, with their states.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShardState)> {
        self.shards.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Next archive index for a shard directory: one past the highest
/// `-{n}.jsonl.gz` present, or 0 for a fresh shard.
fn recover_counter(dir: &Path) -> u32 {
    let pattern = format!("{}/*.jsonl.gz", dir.display());
    let mut max = None;
    if let Ok(paths) = glob::glob(&pattern) {
        for path in paths.flatten() {
            if let Some(n) = archive_index(&path) {
                max = Some(max.map_or(n, |m: u32| m.max(n)));
            }
        }
    }
    max.map_or(0, |m| m + 1)
}

/// Trailing index of an archive name (`en1-17.jsonl.gz` → 17).
fn archive_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".jsonl.gz")?;
    let dash = stem.rfind('-')?;
    stem[dash + 1..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_shard_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut counters = ShardCounters::new();
        let state = counters.shard("en", dir.path());
        assert_eq!(state.counter, 0);
        assert_eq!(state.pending, 0);
    }

    #[test]
    fn recovery_continues_past_highest_archive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en1-1.jsonl.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("en1-7.jsonl.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("en1-3.jsonl.gz"), b"x").unwrap();

        let mut counters = ShardCounters::new();
        assert_eq!(counters.shard("en", dir.path()).counter, 8);
    }

    #[test]
    fn recovery_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en1-2.jsonl.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("en1-9.jsonl"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("weird.jsonl.gz"), b"x").unwrap();

        let mut counters = ShardCounters::new();
        assert_eq!(counters.shard("en", dir.path()).counter, 3);
    }

    #[test]
    fn states_are_independent_per_language() {
        let dir = tempfile::tempdir().unwrap();
        let mut counters = ShardCounters::new();
        counters.shard("en", dir.path()).pending = 5;
        assert_eq!(counters.shard("fr", dir.path()).pending, 0);
        assert_eq!(counters.shard("en", dir.path()).pending, 5);
    }

    #[test]
    fn archive_index_parses_trailing_number() {
        assert_eq!(archive_index(Path::new("en1-17.jsonl.gz")), Some(17));
        assert_eq!(archive_index(Path::new("fr2.5-3.jsonl.gz")), Some(3));
        assert_eq!(archive_index(Path::new("en1.jsonl.gz")), None);
        assert_eq!(archive_index(Path::new("en1-x.jsonl.gz")), None);
    }
}
