//! Listing page → raw candidate rows.
//!
//! The extractor only finds rows and copies their text out. It never decides
//! what a token means; that is the normalizer's job. All parsing happens in
//! synchronous functions because `scraper::Html` is not `Send`.

pub mod pagination;
pub mod profile;

use std::collections::{HashMap, HashSet};

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::normalize::odds::is_price_token;
use crate::types::{Category, PriceTokens, RawCandidate, SourceFamily};
pub use pagination::detect_page_count;
use profile::{CompiledPrices, CompiledProfile, ExtractionProfile};

/// Extract every candidate event row from one listing page.
///
/// A row is the nearest ancestor of an event link (within the profile's
/// depth limit) that exposes at least `category.min_price_tokens()` price
/// slots and does not also hold a different event. Each row is emitted once
/// no matter how many links it contains.
pub fn extract_candidates(
    html: &str,
    page_url: &str,
    category: Category,
    family: SourceFamily,
) -> Result<Vec<RawCandidate>> {
    let profile = ExtractionProfile::for_family(family).compile()?;
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    // Pre-order position of every node, used to find the nearest heading.
    let order: HashMap<_, usize> = document
        .root_element()
        .descendants()
        .enumerate()
        .map(|(i, node)| (node.id(), i))
        .collect();

    let headings: Vec<(usize, ElementRef, String)> = document
        .select(&profile.heading)
        .filter(|h| !is_inside(h, &profile.overlay))
        .filter_map(|h| {
            let text = collapse_text(&h);
            if text.is_empty() {
                return None;
            }
            Some((order.get(&h.id()).copied()?, h, text))
        })
        .collect();

    let min_tokens = category.min_price_tokens();
    let mut seen_rows = HashSet::new();
    let mut candidates = Vec::new();

    for link in document.select(&profile.event_link) {
        if is_inside(&link, &profile.overlay) {
            continue;
        }
        let Some((row, prices)) = find_row(link, &profile, min_tokens) else {
            continue;
        };
        if !seen_rows.insert(row.id()) {
            continue;
        }

        let text = collapse_text(&link);
        let name_parts = name_parts(link);
        if text.is_empty() && name_parts.is_empty() {
            continue;
        }

        let time_hint = row
            .select(&profile.start_time)
            .map(|t| collapse_text(&t))
            .find(|t| !t.is_empty());
        let live_hint = row.select(&profile.live_marker).next().is_some();
        let link_url = link
            .value()
            .attr("href")
            .map(|href| resolve_href(base.as_ref(), href));

        let row_pos = order.get(&row.id()).copied().unwrap_or_default();
        let group_label = headings
            .iter()
            .rev()
            .filter(|(pos, _, _)| *pos < row_pos)
            .find(|(_, heading, _)| !row.ancestors().any(|a| a.id() == heading.id()))
            .map(|(_, _, text)| text.clone());

        candidates.push(RawCandidate {
            text,
            name_parts,
            time_hint,
            live_hint,
            prices,
            link: link_url,
            group_label,
        });
    }

    Ok(candidates)
}

fn find_row<'a>(
    link: ElementRef<'a>,
    profile: &CompiledProfile,
    min_tokens: usize,
) -> Option<(ElementRef<'a>, PriceTokens)> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .take(profile.max_row_depth)
        .take_while(|candidate| !holds_other_event(*candidate, link, &profile.event_link))
        .find_map(|candidate| {
            let prices = collect_prices(candidate, profile);
            (prices.slot_count() >= min_tokens).then_some((candidate, prices))
        })
}

fn holds_other_event(container: ElementRef, link: ElementRef, event_link: &Selector) -> bool {
    let href = link.value().attr("href");
    container
        .select(event_link)
        .any(|other| other.id() != link.id() && other.value().attr("href") != href)
}

fn collect_prices(row: ElementRef, profile: &CompiledProfile) -> PriceTokens {
    match &profile.prices {
        CompiledPrices::BackLay { back, lay } => PriceTokens::BackLay {
            back: price_tokens(row, back, profile),
            lay: price_tokens(row, lay, profile),
        },
        CompiledPrices::Single { buttons } => {
            PriceTokens::Single(price_tokens(row, buttons, profile))
        }
    }
}

fn price_tokens(row: ElementRef, buttons: &Selector, profile: &CompiledProfile) -> Vec<String> {
    row.select(buttons)
        .filter_map(|button| button_token(button, &profile.price_label))
        .take(profile.max_tokens_per_side)
        .collect()
}

/// Price text of one button. Exchange buttons stack the price over the
/// available stake, so an inner label is preferred. Empty buttons are "-".
fn button_token(button: ElementRef, label: &Selector) -> Option<String> {
    if let Some(inner) = button
        .select(label)
        .map(|l| collapse_text(&l))
        .find(|t| is_price_token(t))
    {
        return Some(inner);
    }
    let text = collapse_text(&button);
    if text.is_empty() {
        return Some("-".to_string());
    }
    is_price_token(&text).then_some(text)
}

/// Leaf `span`/`p` texts inside the link.
fn name_parts(link: ElementRef) -> Vec<String> {
    link.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "span" | "p"))
        .filter(|e| !e.children().any(|c| c.value().is_element()))
        .map(|e| collapse_text(&e))
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_inside(el: &ElementRef, selector: &Selector) -> bool {
    selector.matches(el)
        || el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| selector.matches(&a))
}

/// Text nodes joined by single spaces, so adjacent spans never run together.
fn collapse_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
