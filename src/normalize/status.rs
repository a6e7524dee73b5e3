//! Leading time/status prefix detection.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    /// "Starting In 7'mi"
    Countdown,
    /// "In-Play", "LIVE"
    LiveMarker,
    /// "Today 15:00", "Tomorrow 09:30"
    RelativeDay,
    /// "12 Oct 19:45"
    CalendarDate,
    /// "Sat 17:30"
    Weekday,
    /// "15:00"
    Clock,
}

impl PrefixKind {
    /// Whether the prefix carries explicit scheduling information.
    pub fn is_schedule(self) -> bool {
        !matches!(self, PrefixKind::LiveMarker)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPrefix {
    pub kind: PrefixKind,
    /// The matched prefix, trimmed.
    pub text: String,
}

/// Ordered: the first matching pattern wins.
static PREFIX_PATTERNS: LazyLock<Vec<(PrefixKind, Regex)>> = LazyLock::new(|| {
    let months = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";
    let days = "Mon|Tue|Wed|Thu|Fri|Sat|Sun";
    let patterns: [(PrefixKind, String); 6] = [
        (PrefixKind::Countdown, r"(?i)^starting\s+in\s+[\d']+\s*mi?n?s?\b".to_string()),
        (PrefixKind::LiveMarker, r"(?i)^(?:in-play|inplay|in\s+play|live)\b".to_string()),
        (PrefixKind::RelativeDay, r"(?i)^(?:today|tomorrow)\s+\d{1,2}:\d{2}\b".to_string()),
        (
            PrefixKind::CalendarDate,
            format!(r"(?i)^\d{{1,2}}\s+(?:{months})[a-z]*\s+\d{{1,2}}:\d{{2}}\b"),
        ),
        (
            PrefixKind::Weekday,
            format!(r"(?i)^(?:{days})[a-z]*\s+\d{{1,2}}:\d{{2}}\b"),
        ),
        (PrefixKind::Clock, r"^\d{1,2}:\d{2}\b".to_string()),
    ];
    patterns
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(&pattern).expect("valid status regex")))
        .collect()
});

static UNMATCHED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\d+\s*unmatched.*$").expect("valid suffix regex"));

/// Try every prefix pattern in order against `text`. Returns the matched
/// prefix (if any) and the remainder with the prefix stripped.
pub fn split_status_prefix(text: &str) -> (Option<StatusPrefix>, &str) {
    let text = text.trim();
    for (kind, pattern) in PREFIX_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            let prefix = StatusPrefix {
                kind: *kind,
                text: m.as_str().trim().to_string(),
            };
            return (Some(prefix), text[m.end()..].trim());
        }
    }
    (None, text)
}

/// Whole-string match against any status pattern. Used to drop status spans
/// that sit among the name parts.
pub fn is_status_text(text: &str) -> bool {
    let (prefix, rest) = split_status_prefix(text);
    prefix.is_some() && rest.is_empty()
}

/// Remove the trailing "N Unmatched ..." liquidity note some rows append.
pub fn strip_unmatched_suffix(text: &str) -> &str {
    match UNMATCHED_SUFFIX.find(text) {
        Some(m) => text[..m.start()].trim_end(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(text: &str) -> Option<PrefixKind> {
        split_status_prefix(text).0.map(|p| p.kind)
    }

    #[test]
    fn recognizes_each_prefix_kind() {
        assert_eq!(kind_of("Starting In 7'mi Arsenal v Chelsea"), Some(PrefixKind::Countdown));
        assert_eq!(kind_of("In-Play Barcelona v Real Madrid"), Some(PrefixKind::LiveMarker));
        assert_eq!(kind_of("LIVE Nadal v Federer"), Some(PrefixKind::LiveMarker));
        assert_eq!(kind_of("Today 15:00 Arsenal v Chelsea"), Some(PrefixKind::RelativeDay));
        assert_eq!(kind_of("12 Oct 19:45 Lazio v Roma"), Some(PrefixKind::CalendarDate));
        assert_eq!(kind_of("Sat 17:30 Celtic v Rangers"), Some(PrefixKind::Weekday));
        assert_eq!(kind_of("15:00 Leeds v Hull"), Some(PrefixKind::Clock));
        assert_eq!(kind_of("Arsenal v Chelsea"), None);
    }

    #[test]
    fn strips_prefix_from_remainder() {
        let (prefix, rest) = split_status_prefix("Today 15:00 Arsenal v Chelsea");
        assert_eq!(prefix.unwrap().text, "Today 15:00");
        assert_eq!(rest, "Arsenal v Chelsea");
    }

    #[test]
    fn live_word_inside_a_name_is_not_a_marker() {
        // "Liverpool" starts with "Live" but is not a live marker.
        assert_eq!(kind_of("Liverpool v Everton"), None);
    }

    #[test]
    fn status_only_spans_are_detected() {
        assert!(is_status_text("In-Play"));
        assert!(is_status_text("Tomorrow 20:00"));
        assert!(!is_status_text("Arsenal"));
        assert!(!is_status_text("15:00 Cheltenham"));
    }

    #[test]
    fn unmatched_suffix_is_removed() {
        assert_eq!(strip_unmatched_suffix("Arsenal v Chelsea 3 Unmatched Bets"), "Arsenal v Chelsea");
        assert_eq!(strip_unmatched_suffix("Arsenal v Chelsea"), "Arsenal v Chelsea");
    }
}
