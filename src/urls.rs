use url::Url;
use url::form_urlencoded;

/// Rewrite the `page` query parameter, leaving every other parameter alone.
pub fn set_page_param(url: &Url, page: u32) -> Url {
    let mut out = url.clone();
    let others = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();
    {
        let mut pairs = out.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(others);
        pairs.append_pair("page", &page.to_string());
    }
    out
}

/// Starting cursor taken from the start URL; absent or non-numeric means 1.
pub fn start_page_from_url(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .unwrap_or(1)
}

/// The site-assigned listing id is the `id` query parameter of the raw,
/// pre-resolution href. Blank values count as absent.
pub fn extract_item_id(href: &str) -> Option<String> {
    let (_, rest) = href.split_once('?')?;
    let query = rest.split('#').next().unwrap_or(rest);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Resolve a possibly-relative href against the page it was found on.
pub fn resolve_href(page_url: &Url, href: &str) -> Option<String> {
    page_url.join(href).ok().map(|url| url.to_string())
}

/// Fallback dedupe key for records without an item id: drop the fragment and
/// re-encode the query with sorted keys so parameter order cannot split one
/// listing into two identities. Scheme, host and path stay untouched.
pub fn normalize_detail_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    let mut pairs = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        url.set_query(Some(&query));
    }
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn set_page_param_replaces_existing_value() {
        let start = url("https://example.com/list?cat=toys&page=3");
        let rewritten = set_page_param(&start, 7);
        assert_eq!(rewritten.as_str(), "https://example.com/list?cat=toys&page=7");
    }

    #[test]
    fn set_page_param_appends_when_missing() {
        let start = url("https://example.com/list");
        let rewritten = set_page_param(&start, 2);
        assert_eq!(rewritten.as_str(), "https://example.com/list?page=2");
    }

    #[test]
    fn start_page_defaults_to_one() {
        assert_eq!(start_page_from_url(&url("https://example.com/list")), 1);
        assert_eq!(
            start_page_from_url(&url("https://example.com/list?page=abc")),
            1
        );
        assert_eq!(
            start_page_from_url(&url("https://example.com/list?page=5")),
            5
        );
    }

    #[test]
    fn item_id_comes_from_raw_href() {
        assert_eq!(
            extract_item_id("/item?id=abc123&ref=x").as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_item_id("/item?id=9#top").as_deref(), Some("9"));
        assert_eq!(extract_item_id("/item"), None);
        assert_eq!(extract_item_id("/item?ref=x"), None);
        assert_eq!(extract_item_id("/item?id="), None);
    }

    #[test]
    fn resolve_href_handles_relative_and_absolute() {
        let page = url("https://example.com/list?page=1");
        assert_eq!(
            resolve_href(&page, "/item?id=5").as_deref(),
            Some("https://example.com/item?id=5")
        );
        assert_eq!(
            resolve_href(&page, "https://cdn.example.net/a.jpg").as_deref(),
            Some("https://cdn.example.net/a.jpg")
        );
    }

    #[test]
    fn normalized_urls_ignore_param_order_and_fragment() {
        let a = normalize_detail_url("https://example.com/detail?b=2&a=1").unwrap();
        let b = normalize_detail_url("https://example.com/detail?a=1&b=2#frag").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "https://example.com/detail?a=1&b=2");
    }

    #[test]
    fn normalization_keeps_scheme_host_and_path() {
        let normalized = normalize_detail_url("https://example.com/Item/Detail?id=9").unwrap();
        assert_eq!(normalized, "https://example.com/Item/Detail?id=9");
        assert_eq!(normalize_detail_url("not a url"), None);
    }
}
