use std::collections::HashSet;

use crate::types::Candidate;
use crate::urls::normalize_detail_url;

/// Tracks which listing identities have already been emitted this run. State
/// lives for one crawl and is never persisted across invocations.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen_item_ids: HashSet<String>,
    seen_detail_urls: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True means novel and the caller should write the record. The
    /// site-assigned item id is the stronger key; the normalized detail URL is
    /// only a fallback for id-less records. A record carrying both registers
    /// by id alone, so a later id-less record sharing only the URL is not
    /// caught — the fallback gap is intentional, observed site behavior.
    pub fn admit(&mut self, candidate: &Candidate) -> bool {
        let item_id = candidate
            .item_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let norm_url = candidate
            .detail_url
            .as_deref()
            .and_then(normalize_detail_url);

        let duplicate = match (&item_id, &norm_url) {
            (Some(id), _) => self.seen_item_ids.contains(*id),
            (None, Some(url)) => self.seen_detail_urls.contains(url),
            (None, None) => false,
        };
        if duplicate {
            return false;
        }

        if let Some(id) = item_id {
            self.seen_item_ids.insert(id.to_string());
        } else if let Some(url) = norm_url {
            self.seen_detail_urls.insert(url);
        }
        true
    }
}
