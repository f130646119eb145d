use std::time::Duration;

use url::Url;

/// One listing block as extracted from a page, before dedup filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub price_jpy: Option<u64>,
    pub buyout_jpy: Option<u64>,
    pub detail_url: Option<String>,
    pub image_url: Option<String>,
    pub source_page: String,
}

impl Candidate {
    /// A block carrying none of these fields is noise and never leaves the
    /// extractor.
    pub fn has_substance(&self) -> bool {
        self.title.is_some()
            || self.price_jpy.is_some()
            || self.buyout_jpy.is_some()
            || self.detail_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: Url,
    /// Page-count budget; unbounded when absent.
    pub pages: Option<u32>,
    pub until_empty: bool,
    pub delay: Duration,
}

/// Reported once the controller reaches its terminal state. Zero rows is a
/// valid outcome, not an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    pub pages_visited: usize,
    pub rows_written: usize,
}
