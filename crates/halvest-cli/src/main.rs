//! halvest - CLI for the HAL open-access harvesting pipeline
//!
//! Crawls HAL's search API, downloads paper PDFs, and packages
//! metadata plus extracted full texts into language-sharded corpora.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "halvest")]
#[command(about = "HAL open-access paper harvesting pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./halvest.toml or ~/.config/halvest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the HAL API and write JSON page files
    Fetch(cmd::fetch::FetchArgs),
    /// Download paper PDFs listed in the page files
    Download(cmd::download::DownloadArgs),
    /// Package records with full texts into language shards
    Pack(cmd::pack::PackArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(halvest_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    halvest_core::init_logging(quiet, cli.debug, multi);

    // Load configuration
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Download(args) => cmd::download::run(args, &config, &progress),
        Command::Pack(args) => cmd::pack::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["API base URL", &config.api.base_url]);
            table.add_row(vec!["Query", &config.api.query]);
            table.add_row(vec![
                "Response directory",
                &config.paths.response_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "PDF directory",
                &config.paths.pdf_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Output directory",
                &config.paths.output_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Full-text archive",
                &config
                    .paths
                    .fulltext_zip
                    .as_deref()
                    .unwrap_or("not set")
                    .to_string(),
            ]);
            table.add_row(vec![
                "Download concurrency",
                &config.download.concurrency.to_string(),
            ]);
            table.add_row(vec!["Corpus version", &config.pack.version]);
            table.add_row(vec![
                "Shard threshold",
                &config.pack.shard_threshold.to_string(),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
