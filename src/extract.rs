use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::types::Candidate;
use crate::urls::{extract_item_id, resolve_href};

const BLOCK_SELECTOR: &str = "div.list_item_block";
const TITLE_SELECTOR: &str = ".products-txt a.translate h4";
// The site renders exactly one of these two price nodes depending on auction
// state; the auction price is checked first so the order is deterministic.
const CURRENT_PRICE_SELECTOR: &str = ".short-price .current_price strong";
const LISTING_PRICE_SELECTOR: &str = ".short-price .current_listing_price strong";
const BUYOUT_SELECTOR: &str = ".short-price .buy_now_price strong";
const DETAIL_LINK_SELECTOR: &str = ".products-txt a.translate";
const IMAGE_SELECTOR: &str = ".products-pic img";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("markup is not a structured document")]
    MalformedDocument,
}

/// Parse one page of markup into candidates, one per listing block. Missing
/// sub-fields are tolerated per block; blocks with no usable field at all are
/// dropped. Only input with no markup whatsoever is an error.
pub fn extract_listings(markup: &str, page_url: &Url) -> Result<Vec<Candidate>, ExtractError> {
    if !markup.contains('<') {
        return Err(ExtractError::MalformedDocument);
    }
    let doc = Html::parse_document(markup);
    let Ok(block_selector) = Selector::parse(BLOCK_SELECTOR) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for block in doc.select(&block_selector) {
        let title = first_text(block, TITLE_SELECTOR);
        let price_jpy = first_text(block, CURRENT_PRICE_SELECTOR)
            .or_else(|| first_text(block, LISTING_PRICE_SELECTOR))
            .as_deref()
            .and_then(clean_price);
        let buyout_jpy = first_text(block, BUYOUT_SELECTOR)
            .as_deref()
            .and_then(clean_price);

        let rel_href = first_attr(block, DETAIL_LINK_SELECTOR, "href");
        let detail_url = rel_href
            .as_deref()
            .and_then(|href| resolve_href(page_url, href));
        let image_url = first_attr(block, IMAGE_SELECTOR, "src")
            .map(|src| src.trim().to_string())
            .filter(|src| !src.is_empty())
            .and_then(|src| resolve_href(page_url, &src));
        let item_id = rel_href.as_deref().and_then(extract_item_id);

        let candidate = Candidate {
            item_id,
            title,
            price_jpy,
            buyout_jpy,
            detail_url,
            image_url,
            source_page: page_url.to_string(),
        };
        if candidate.has_substance() {
            out.push(candidate);
        }
    }
    Ok(out)
}

/// Localized currency text stripped down to its digits; an empty or
/// non-numeric remainder is absent, not an error.
pub fn clean_price(text: &str) -> Option<u64> {
    let digits = text
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn first_text(block: ElementRef<'_>, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    block.select(&selector).find_map(|el| {
        let text = normalize_text(&el.text().collect::<Vec<_>>().join(" "));
        (!text.is_empty()).then_some(text)
    })
}

fn first_attr(block: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    block
        .select(&selector)
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.to_string())
}

fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://auctions.example.com/list?page=1").unwrap()
    }

    fn wrap(blocks: &str) -> String {
        format!("<html><body>{blocks}</body></html>")
    }

    const FULL_BLOCK: &str = r#"
        <div class="list_item_block">
          <div class="products-pic"><img src="/img/a100.jpg"></div>
          <div class="products-txt">
            <a class="translate" href="/item?id=a100"><h4>Vintage Camera</h4></a>
          </div>
          <div class="short-price">
            <div class="current_price"><strong>¥1,200</strong></div>
            <div class="buy_now_price"><strong>¥3,000</strong></div>
          </div>
        </div>"#;

    #[test]
    fn extracts_all_fields_from_a_full_block() {
        let candidates = extract_listings(&wrap(FULL_BLOCK), &page_url()).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.item_id.as_deref(), Some("a100"));
        assert_eq!(c.title.as_deref(), Some("Vintage Camera"));
        assert_eq!(c.price_jpy, Some(1200));
        assert_eq!(c.buyout_jpy, Some(3000));
        assert_eq!(
            c.detail_url.as_deref(),
            Some("https://auctions.example.com/item?id=a100")
        );
        assert_eq!(
            c.image_url.as_deref(),
            Some("https://auctions.example.com/img/a100.jpg")
        );
        assert_eq!(c.source_page, "https://auctions.example.com/list?page=1");
    }

    #[test]
    fn auction_price_takes_precedence_over_listing_price() {
        let block = r#"
            <div class="list_item_block">
              <div class="products-txt"><a class="translate" href="/item?id=x"><h4>T</h4></a></div>
              <div class="short-price">
                <div class="current_listing_price"><strong>¥900</strong></div>
                <div class="current_price"><strong>¥500</strong></div>
              </div>
            </div>"#;
        let candidates = extract_listings(&wrap(block), &page_url()).unwrap();
        assert_eq!(candidates[0].price_jpy, Some(500));
    }

    #[test]
    fn listing_price_is_the_fallback() {
        let block = r#"
            <div class="list_item_block">
              <div class="products-txt"><a class="translate" href="/item?id=x"><h4>T</h4></a></div>
              <div class="short-price">
                <div class="current_listing_price"><strong>¥900</strong></div>
              </div>
            </div>"#;
        let candidates = extract_listings(&wrap(block), &page_url()).unwrap();
        assert_eq!(candidates[0].price_jpy, Some(900));
    }

    #[test]
    fn malformed_price_text_is_data_loss_not_an_error() {
        let block = r#"
            <div class="list_item_block">
              <div class="products-txt"><a class="translate" href="/item?id=x"><h4>T</h4></a></div>
              <div class="short-price"><div class="current_price"><strong>ask seller</strong></div></div>
            </div>"#;
        let candidates = extract_listings(&wrap(block), &page_url()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].price_jpy, None);
    }

    #[test]
    fn noise_blocks_yield_nothing() {
        let block = r#"<div class="list_item_block"><span>sponsored</span></div>"#;
        let candidates = extract_listings(&wrap(block), &page_url()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn a_page_without_blocks_is_empty_not_an_error() {
        let candidates = extract_listings("<html><body></body></html>", &page_url()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn input_without_markup_is_malformed() {
        assert!(matches!(
            extract_listings("plain text, no tags", &page_url()),
            Err(ExtractError::MalformedDocument)
        ));
        assert!(matches!(
            extract_listings("", &page_url()),
            Err(ExtractError::MalformedDocument)
        ));
    }

    #[test]
    fn clean_price_rules() {
        assert_eq!(clean_price("¥1,200"), Some(1200));
        assert_eq!(clean_price("no digits"), None);
        assert_eq!(clean_price(""), None);
        assert_eq!(clean_price("約 3,500 円"), Some(3500));
    }
}
