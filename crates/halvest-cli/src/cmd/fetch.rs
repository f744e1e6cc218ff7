//! Fetch subcommand - crawl the HAL API into JSON page files

use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::Args;

use halvest_core::{SharedProgress, fmt_num};

use crate::config::Config;

use super::print_summary;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Solr query in HAL syntax (default from config)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Only papers indexed on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from_date: Option<NaiveDate>,

    /// Hour refining --from-date (HH:MM:SS)
    #[arg(long, value_parser = parse_hour)]
    pub from_hour: Option<NaiveTime>,

    /// Only papers indexed on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to_date: Option<NaiveDate>,

    /// Hour refining --to-date (HH:MM:SS)
    #[arg(long, value_parser = parse_hour)]
    pub to_hour: Option<NaiveTime>,

    /// Output directory for page files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also download the PDFs once the crawl finishes
    #[arg(long)]
    pub pdf: bool,

    /// PDF output directory (with --pdf)
    #[arg(long)]
    pub pdf_dir: Option<PathBuf>,

    /// Number of parallel downloads (with --pdf)
    #[arg(short = 'w', long)]
    pub concurrency: Option<usize>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

fn parse_hour(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| format!("Invalid hour format: {e}"))
}

pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let response_dir = args
        .output
        .unwrap_or_else(|| config.paths.response_dir.clone());

    let hal_config = halvest_hal::HalConfig {
        base_url: config.api.base_url.clone(),
        query: args.query.unwrap_or_else(|| config.api.query.clone()),
        from_date: args.from_date.map(|d| d.format("%Y-%m-%d").to_string()),
        from_hour: args.from_hour.map(|t| t.format("%H:%M:%S").to_string()),
        to_date: args.to_date.map(|d| d.format("%Y-%m-%d").to_string()),
        to_hour: args.to_hour.map(|t| t.format("%H:%M:%S").to_string()),
        response_dir: response_dir.clone(),
        page_threshold: halvest_hal::PAGE_THRESHOLD,
    };

    log::info!("Fetching HAL query: {}", hal_config.query);
    log::info!("  Output: {}", response_dir.display());

    // The crawl has no known length up front; show a spinner instead.
    let stage = progress.stage_line("fetch");
    stage.set_message(hal_config.query.clone());
    let summary = halvest_hal::fetch(&hal_config);
    stage.finish_and_clear();
    let summary = summary?;

    print_summary(
        "Fetch",
        &[
            ("Matches", fmt_num(summary.total_matches as usize)),
            ("Pages", fmt_num(summary.pages as usize)),
            (
                "Records",
                format!(
                    "{} kept, {} dropped",
                    fmt_num(summary.records_kept as usize),
                    fmt_num(summary.records_dropped as usize)
                ),
            ),
            ("Page files", summary.page_files.to_string()),
        ],
    );

    if args.pdf {
        let tasks = halvest_download::load_tasks(&response_dir)?;
        let dl_config = halvest_download::DownloadConfig {
            pdf_dir: args.pdf_dir.unwrap_or_else(|| config.paths.pdf_dir.clone()),
            concurrency: args.concurrency.unwrap_or(config.download.concurrency),
        };
        let dl = halvest_download::run(&tasks, &dl_config, progress)?;
        print_summary(
            "Download",
            &[
                ("Saved", fmt_num(dl.saved)),
                ("Skipped", fmt_num(dl.skipped)),
            ],
        );
    }

    Ok(())
}
