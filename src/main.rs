mod crawl;
mod data_io;
mod dedup;
mod extract;
mod fetch;
mod types;
mod urls;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use crate::crawl::run_crawl;
use crate::data_io::{OutputSinks, default_output_path, load_review_rows};
use crate::fetch::{DEFAULT_USER_AGENT, PageFetcher};
use crate::types::CrawlConfig;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "listgrab",
    version,
    about = "Paginated auction-listing scraper with spreadsheet-ready CSV/XLSX output"
)]
struct Cli {
    /// Listing URL to page 1 (or any page); its page parameter is rewritten
    /// per iteration.
    #[arg(value_name = "URL", required_unless_present = "review_file")]
    url: Option<String>,

    /// Load a previously written table and preview it instead of scraping.
    #[arg(long = "review", value_name = "FILE")]
    review_file: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also write a rich spreadsheet with evaluable formulas and pre-sized rows.
    #[arg(long, value_name = "FILE")]
    xlsx: Option<PathBuf>,

    /// Page-count budget; unbounded when omitted.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pages: Option<u32>,

    /// Stop when a page yields zero listings.
    #[arg(long, default_value_t = false)]
    until_empty: bool,

    #[arg(long, value_name = "SECS", default_value_t = 1.0)]
    delay_secs: f64,

    /// Transient-fetch retry attempts; 0 surfaces the first failure.
    #[arg(long, value_name = "N", default_value_t = 3)]
    retries: u32,

    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Thumbnail edge in pixels; drives the IMAGE formula and row/column sizing.
    #[arg(long, value_name = "PX", default_value_t = 160)]
    img_px: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Some(review_file) = cli.review_file.as_deref() {
        return run_review(review_file);
    }

    let raw_url = cli.url.as_deref().context("missing URL")?;
    let start_url =
        Url::parse(raw_url).with_context(|| format!("invalid start URL: {raw_url}"))?;

    let csv_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_path(&start_url)));

    // Sinks open before the first fetch; an unwritable path fails here.
    let mut sinks = OutputSinks::open(&csv_path, cli.xlsx.as_deref(), cli.img_px)
        .with_context(|| format!("failed to open output {}", csv_path.display()))?;

    let user_agent = cli.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let fetcher = PageFetcher::new(user_agent, cli.retries)?;

    let config = CrawlConfig {
        start_url,
        pages: cli.pages,
        until_empty: cli.until_empty,
        delay: Duration::from_secs_f64(cli.delay_secs.max(0.0)),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current page");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    let crawl_result = run_crawl(&config, &fetcher, &mut sinks, shutdown).await;
    let finalize_result = sinks.finalize();
    let summary = crawl_result?;
    finalize_result.context("failed to finalize output sinks")?;

    info!(
        "done: visited {} pages, wrote {} unique rows to {}{}",
        summary.pages_visited,
        summary.rows_written,
        csv_path.display(),
        cli.xlsx
            .as_deref()
            .map(|path| format!(" and {}", path.display()))
            .unwrap_or_default()
    );
    Ok(())
}

fn run_review(path: &Path) -> anyhow::Result<()> {
    let rows =
        load_review_rows(path).with_context(|| format!("failed to load {}", path.display()))?;
    println!("{} rows in {}", rows.len(), path.display());
    for (idx, row) in rows.iter().take(10).enumerate() {
        println!(
            "{:>3}  {}  {}  {}",
            idx + 1,
            row.title,
            row.detail_url.as_deref().unwrap_or("-"),
            row.image_url.as_deref().unwrap_or("-")
        );
    }
    if rows.len() > 10 {
        println!("... {} more rows", rows.len() - 10);
    }
    Ok(())
}
