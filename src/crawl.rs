use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use crate::data_io::{OutputSinks, SinkError};
use crate::dedup::DedupLedger;
use crate::extract::extract_listings;
use crate::fetch::PageSource;
use crate::types::{CrawlConfig, CrawlSummary};
use crate::urls::{set_page_param, start_page_from_url};

/// Drive the fetch/extract/dedup/write loop across pages, strictly
/// sequentially: page N+1 is never touched before page N's rows are written,
/// so output row order equals site-visit order and the ledger observes
/// candidates in a deterministic order.
///
/// A fatal fetch or parse error stops the run and is logged, not propagated;
/// rows written so far stay valid. Only sink failures surface as errors.
pub async fn run_crawl(
    config: &CrawlConfig,
    source: &dyn PageSource,
    sinks: &mut OutputSinks,
    shutdown: Arc<AtomicBool>,
) -> Result<CrawlSummary, SinkError> {
    let start_page = start_page_from_url(&config.start_url);
    let mut ledger = DedupLedger::new();
    let mut cursor = start_page;
    let mut summary = CrawlSummary::default();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("stop requested, halting before page {cursor}");
            break;
        }

        let page_url = set_page_param(&config.start_url, cursor);
        info!("fetching page {cursor}: {page_url}");

        let markup = match source.fetch(page_url.as_str()).await {
            Ok(markup) => markup,
            Err(err) => {
                error!("fetch failed on page {cursor} ({page_url}): {err}");
                break;
            }
        };
        summary.pages_visited += 1;

        let candidates = match extract_listings(&markup, &page_url) {
            Ok(candidates) => candidates,
            Err(err) => {
                error!("parse failed on page {cursor} ({page_url}): {err}");
                break;
            }
        };

        let mut page_written = 0usize;
        let mut page_skipped = 0usize;
        for candidate in &candidates {
            if ledger.admit(candidate) {
                sinks.write_row(candidate)?;
                page_written += 1;
                summary.rows_written += 1;
            } else {
                page_skipped += 1;
            }
        }

        if candidates.is_empty() {
            info!("page {cursor} returned zero listings");
            if config.until_empty {
                break;
            }
        } else {
            info!(
                "page {cursor}: wrote {page_written} new rows, skipped {page_skipped} duplicates ({} total)",
                summary.rows_written
            );
        }

        if let Some(budget) = config.pages
            && cursor >= start_page.saturating_add(budget) - 1
        {
            break;
        }
        cursor += 1;
        tokio::time::sleep(config.delay).await;
    }

    Ok(summary)
}
