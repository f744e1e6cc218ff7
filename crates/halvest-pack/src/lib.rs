//! Packaging stage: join crawl records with their GROBID full texts
//! and shard them by language into rotated, checksummed gzip archives.
//!
//! The stage is resumable: shard counters recover from the archives
//! already on disk, so a rerun continues the numbering instead of
//! overwriting finished work.

pub mod checksum;
pub mod counters;
pub mod fulltext;
pub mod packer;
pub mod validate;

pub use checksum::{append_ledger, sha256_file};
pub use counters::{ShardCounters, ShardState};
pub use fulltext::FullTextArchive;
pub use packer::{PackConfig, PackSummary, SHARD_THRESHOLD, run};
pub use validate::{TextIssue, validate_text};
