//! Page-count discovery for paginated listings.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::Html;

use crate::error::Result;
use crate::extract::profile::{parse_selector, ExtractionProfile};

static TRAILING_PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)/?$").expect("valid page number regex"));

/// Largest page number advertised by the first page of a listing.
///
/// Two signals are combined: links of the form `{base_url}/N` and numeric
/// link texts inside a pagination container. Defaults to 1.
pub fn detect_page_count(html: &str, base_url: &str, profile: &ExtractionProfile) -> Result<u32> {
    let document = Html::parse_document(html);
    let any_link = parse_selector("a[href]")?;
    let container = parse_selector(profile.pagination)?;

    let base = Url::parse(base_url).ok();
    let base_prefix = format!("{}/", base_url.trim_end_matches('/'));

    let mut max_page = 1u32;
    for link in document.select(&any_link) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let absolute = match &base {
            Some(base) => base.join(href).map(|u| u.to_string()).unwrap_or_default(),
            None => href.to_string(),
        };
        if !absolute.starts_with(&base_prefix) {
            continue;
        }
        if let Some(n) = page_number_of(&absolute[base_prefix.len() - 1..]) {
            max_page = max_page.max(n);
        }
    }

    let anchors = parse_selector("a")?;
    if let Some(pagination) = document.select(&container).next() {
        for link in pagination.select(&anchors) {
            let text = link.text().collect::<String>();
            if let Ok(n) = text.trim().parse::<u32>() {
                max_page = max_page.max(n);
            }
        }
    }

    Ok(max_page.max(1))
}

/// `"/7"` or `"/7/"` → 7. Anything with more path segments is not a page link.
fn page_number_of(suffix: &str) -> Option<u32> {
    let caps = TRAILING_PAGE_NUMBER.captures(suffix)?;
    if caps.get(0)?.start() != 0 {
        return None;
    }
    caps[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::profile::EXCHANGE_PROFILE;

    const BASE: &str = "https://www.example.test/exchange/football-betting-1";

    #[test]
    fn reads_trailing_page_numbers_from_links() {
        let html = r#"
            <a href="/exchange/football-betting-1/2/">2</a>
            <a href="https://www.example.test/exchange/football-betting-1/7">next</a>
            <a href="/exchange/football-betting-1/market/1.234">Arsenal v Chelsea</a>
            <a href="/exchange/tennis-betting-2/40">tennis</a>
        "#;
        assert_eq!(detect_page_count(html, BASE, &EXCHANGE_PROFILE).unwrap(), 7);
    }

    #[test]
    fn reads_numeric_text_inside_pagination_container() {
        let html = r#"
            <div class="coupon-pagination">
                <a href="?p=2">2</a><a href="?p=3">3</a><a href="?p=12">12</a><a href="?p=2">Next</a>
            </div>
        "#;
        assert_eq!(detect_page_count(html, BASE, &EXCHANGE_PROFILE).unwrap(), 12);
    }

    #[test]
    fn defaults_to_one_page() {
        let html = "<html><body><p>No events</p></body></html>";
        assert_eq!(detect_page_count(html, BASE, &EXCHANGE_PROFILE).unwrap(), 1);
    }
}
