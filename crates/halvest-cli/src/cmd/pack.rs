//! Pack subcommand - build language-sharded corpus archives

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use halvest_core::{SharedProgress, fmt_num};

use crate::config::Config;

use super::print_summary;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Zip archive of GROBID full texts
    #[arg(short, long)]
    pub texts: Option<PathBuf>,

    /// Directory of JSON page files from `fetch`
    #[arg(short, long)]
    pub responses: Option<PathBuf>,

    /// Output directory for the corpus
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Corpus version tag baked into archive names
    #[arg(short = 'v', long)]
    pub version: Option<String>,

    /// Records per archive before rotation
    #[arg(long)]
    pub shard_threshold: Option<u64>,
}

pub fn run(args: PackArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let fulltext_zip = match args
        .texts
        .or_else(|| config.paths.fulltext_zip.as_deref().map(PathBuf::from))
    {
        Some(path) => path,
        None => bail!("no full-text archive: pass --texts or set paths.fulltext_zip"),
    };

    let pack_config = halvest_pack::PackConfig {
        response_dir: args
            .responses
            .unwrap_or_else(|| config.paths.response_dir.clone()),
        fulltext_zip,
        output_dir: args.output.unwrap_or_else(|| config.paths.output_dir.clone()),
        version: args.version.unwrap_or_else(|| config.pack.version.clone()),
        shard_threshold: args.shard_threshold.unwrap_or(config.pack.shard_threshold),
    };

    log::info!("Packing corpus version {}", pack_config.version);
    log::info!("  Responses: {}", pack_config.response_dir.display());
    log::info!("  Texts: {}", pack_config.fulltext_zip.display());
    log::info!("  Output: {}", pack_config.output_dir.display());

    let summary = halvest_pack::run(&pack_config, progress)?;

    print_summary(
        "Pack",
        &[
            ("Records", fmt_num(summary.records as usize)),
            ("Packed", fmt_num(summary.packed as usize)),
            ("Dropped", fmt_num(summary.dropped as usize)),
            ("Languages", summary.languages.to_string()),
            ("Archives", summary.archives.to_string()),
        ],
    );

    Ok(())
}
