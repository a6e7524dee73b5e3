use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category & source family
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Football,
    Tennis,
    Basketball,
    HorseRacing,
    Cricket,
    Golf,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Football,
        Category::Tennis,
        Category::Basketball,
        Category::HorseRacing,
        Category::Cricket,
        Category::Golf,
    ];

    /// Football-like categories list home/draw/away markets.
    pub fn is_three_way(self) -> bool {
        matches!(self, Category::Football)
    }

    /// Fewest price tokens a row needs before it counts as a market row.
    /// Race/outright listings show one price per runner; everything else is head-to-head.
    pub fn min_price_tokens(self) -> usize {
        match self {
            Category::HorseRacing | Category::Golf => 1,
            _ => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Football => "football",
            Category::Tennis => "tennis",
            Category::Basketball => "basketball",
            Category::HorseRacing => "horse-racing",
            Category::Cricket => "cricket",
            Category::Golf => "golf",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feed family of a source. Stored as `source_category_tag`: two families can
/// list the same event under differently shaped pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFamily {
    /// Paginated back/lay listings.
    Exchange,
    /// Single-page fixed-odds listings (no lay side).
    Sportsbook,
}

impl SourceFamily {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exchange" => Some(SourceFamily::Exchange),
            "sportsbook" => Some(SourceFamily::Sportsbook),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceFamily::Exchange => "exchange",
            SourceFamily::Sportsbook => "sportsbook",
        }
    }

    pub fn is_paginated(self) -> bool {
        matches!(self, SourceFamily::Exchange)
    }
}

impl std::fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Extractor output
// ---------------------------------------------------------------------------

/// Price tokens of one row, in page order. Semantics (home/draw/away) are
/// assigned later by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceTokens {
    /// Exchange rows: parallel back and lay columns.
    BackLay { back: Vec<String>, lay: Vec<String> },
    /// Fixed-odds rows: one price per selection.
    Single(Vec<String>),
}

impl PriceTokens {
    /// Number of selection slots the row exposes.
    pub fn slot_count(&self) -> usize {
        match self {
            PriceTokens::BackLay { back, lay } => back.len().max(lay.len()),
            PriceTokens::Single(tokens) => tokens.len(),
        }
    }

    pub fn back(&self, i: usize) -> Option<&str> {
        match self {
            PriceTokens::BackLay { back, .. } => back.get(i).map(String::as_str),
            PriceTokens::Single(tokens) => tokens.get(i).map(String::as_str),
        }
    }

    /// Lay token for slot `i`; always `None` for fixed-odds rows.
    pub fn lay(&self, i: usize) -> Option<&str> {
        match self {
            PriceTokens::BackLay { lay, .. } => lay.get(i).map(String::as_str),
            PriceTokens::Single(_) => None,
        }
    }
}

/// One candidate event row as found in the page, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Whitespace-collapsed link text: time/status prefix followed by names.
    pub text: String,
    /// Leaf span/p texts inside the event link, in order.
    pub name_parts: Vec<String>,
    /// Text of a dedicated start-time element, when the row has one.
    pub time_hint: Option<String>,
    /// Row carries an in-play/live marker element.
    pub live_hint: bool,
    pub prices: PriceTokens,
    /// Absolute event URL.
    pub link: Option<String>,
    pub group_label: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Upcoming,
    Live,
}

impl LifecycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Upcoming => "upcoming",
            LifecycleStatus::Live => "live",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRole {
    Home,
    Draw,
    Away,
    /// Positional role, 1-based.
    Positional(usize),
}

impl std::fmt::Display for SelectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionRole::Home => write!(f, "home"),
            SelectionRole::Draw => write!(f, "draw"),
            SelectionRole::Away => write!(f, "away"),
            SelectionRole::Positional(n) => write!(f, "selection_{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub label: String,
    pub role: SelectionRole,
    pub back: Option<f64>,
    pub lay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub category: Category,
    pub family: SourceFamily,
    pub group_label: String,
    pub display_name: String,
    pub scheduled_time: Option<String>,
    pub is_live: bool,
    pub status: LifecycleStatus,
    pub link: Option<String>,
    pub selections: Vec<Selection>,
}

/// A normalized event that survived deduplication, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedEvent {
    pub event: NormalizedEvent,
    pub source_identifier: String,
    pub relative_order: i64,
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// Aggregate result of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
}

impl ScrapeResult {
    /// Plain-text form handed back to tool-calling clients that asked for a refresh.
    pub fn summary(&self) -> String {
        let mut out = format!("Refreshed all odds. Total: {} events.\n", self.total);
        for (category, count) in &self.counts {
            out.push_str(&format!("  - {category}: {count} events\n"));
        }
        if self.total == 0 {
            out.push_str("No events were stored; the source layout may have changed.\n");
        }
        out
    }
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_lay_slot_count_uses_longer_side() {
        let tokens = PriceTokens::BackLay {
            back: vec!["2.0".into(), "3.0".into()],
            lay: vec!["2.1".into(), "3.1".into(), "4.1".into()],
        };
        assert_eq!(tokens.slot_count(), 3);
        assert_eq!(tokens.back(2), None);
        assert_eq!(tokens.lay(2), Some("4.1"));
    }

    #[test]
    fn single_tokens_have_no_lay_side() {
        let tokens = PriceTokens::Single(vec!["5/1".into()]);
        assert_eq!(tokens.slot_count(), 1);
        assert_eq!(tokens.back(0), Some("5/1"));
        assert_eq!(tokens.lay(0), None);
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("darts"), None);
    }

    #[test]
    fn summary_lists_every_category() {
        let mut counts = BTreeMap::new();
        counts.insert("football".to_string(), 12);
        counts.insert("tennis".to_string(), 0);
        let result = ScrapeResult { total: 12, counts };
        let text = result.summary();
        assert!(text.starts_with("Refreshed all odds. Total: 12 events."));
        assert!(text.contains("  - football: 12 events"));
        assert!(text.contains("  - tennis: 0 events"));
    }

    #[test]
    fn positional_role_renders_one_based_name() {
        assert_eq!(SelectionRole::Positional(3).to_string(), "selection_3");
        assert_eq!(SelectionRole::Draw.to_string(), "draw");
    }
}
