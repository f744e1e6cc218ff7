//! Download subcommand - fetch paper PDFs from the page files

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use halvest_core::{SharedProgress, fmt_num};

use crate::config::Config;

use super::print_summary;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Directory of JSON page files from `fetch`
    #[arg(short, long)]
    pub responses: Option<PathBuf>,

    /// Output directory for PDFs
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel downloads
    #[arg(short = 'w', long)]
    pub concurrency: Option<usize>,
}

pub fn run(args: DownloadArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let response_dir = args
        .responses
        .unwrap_or_else(|| config.paths.response_dir.clone());
    let dl_config = halvest_download::DownloadConfig {
        pdf_dir: args.output.unwrap_or_else(|| config.paths.pdf_dir.clone()),
        concurrency: args.concurrency.unwrap_or(config.download.concurrency),
    };

    let tasks = halvest_download::load_tasks(&response_dir)?;
    log::info!("  Responses: {}", response_dir.display());
    log::info!("  Output: {}", dl_config.pdf_dir.display());

    let summary = halvest_download::run(&tasks, &dl_config, progress)?;

    print_summary(
        "Download",
        &[
            ("Tasks", fmt_num(tasks.len())),
            ("Saved", fmt_num(summary.saved)),
            ("Skipped", fmt_num(summary.skipped)),
        ],
    );

    Ok(())
}
