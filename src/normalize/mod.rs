//! Raw candidate → `NormalizedEvent`.
//!
//! Pure functions only. Everything here is deterministic on its input so the
//! extractor and the store can be tested independently of it.

pub mod names;
pub mod odds;
pub mod roles;
pub mod status;

use crate::types::{Category, LifecycleStatus, NormalizedEvent, RawCandidate, SourceFamily};
use names::{normalize_name, parse_participants, uses_at_form, NameForm, ParsedName};
use odds::is_price_token;
use status::{is_status_text, split_status_prefix, strip_unmatched_suffix, PrefixKind};

pub const OTHER_GROUP: &str = "Other";

/// Shortest display name worth keeping.
const MIN_DISPLAY_NAME_CHARS: usize = 3;
const MAX_NAME_PART_CHARS: usize = 80;

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no participant name could be resolved")]
    UnresolvedName,
    #[error("display name too short: {0:?}")]
    NameTooShort(String),
}

pub fn normalize(
    raw: &RawCandidate,
    category: Category,
    family: SourceFamily,
) -> Result<NormalizedEvent, Rejection> {
    let (prefix, remainder) = split_status_prefix(&raw.text);
    let remainder = strip_unmatched_suffix(remainder);

    let name = resolve_name(raw, remainder).ok_or(Rejection::UnresolvedName)?;
    let display_name = name.display_name();
    if display_name.chars().count() < MIN_DISPLAY_NAME_CHARS {
        return Err(Rejection::NameTooShort(display_name));
    }

    let time_hint = raw
        .time_hint
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let scheduled_time = match &prefix {
        Some(p) if p.kind.is_schedule() => Some(p.text.clone()),
        _ => time_hint.map(str::to_string),
    };

    // An explicit schedule outranks a live marker.
    let live_marked =
        raw.live_hint || matches!(&prefix, Some(p) if p.kind == PrefixKind::LiveMarker);
    let is_live = live_marked && scheduled_time.is_none();

    let selections = roles::assign_selections(category, &name, &raw.prices);

    Ok(NormalizedEvent {
        category,
        family,
        group_label: clean_group_label(raw.group_label.as_deref()),
        display_name,
        scheduled_time,
        is_live,
        status: if is_live {
            LifecycleStatus::Live
        } else {
            LifecycleStatus::Upcoming
        },
        link: raw.link.clone(),
        selections,
    })
}

/// Prefer the separate name elements when there are at least two; fall back
/// to splitting the link text, then to a lone name element.
fn resolve_name(raw: &RawCandidate, remainder: &str) -> Option<ParsedName> {
    let parts: Vec<&str> = raw
        .name_parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| is_usable_name_part(p))
        .collect();

    if parts.len() >= 2 {
        let form = if uses_at_form(&raw.text) {
            NameForm::At
        } else {
            NameForm::Versus
        };
        return Some(ParsedName {
            form,
            parts: parts.iter().take(2).map(|p| normalize_name(p)).collect(),
        });
    }

    parse_participants(remainder).or_else(|| {
        parts.first().map(|p| ParsedName {
            form: NameForm::Single,
            parts: vec![normalize_name(p)],
        })
    })
}

fn is_usable_name_part(part: &str) -> bool {
    let len = part.chars().count();
    if len < 2 || len > MAX_NAME_PART_CHARS {
        return false;
    }
    if matches!(part.to_lowercase().as_str(), "v" | "vs" | "vs." | "@") {
        return false;
    }
    !is_status_text(part) && !is_price_token(part)
}

/// Competition headers sometimes carry breadcrumb arrows or a trailing
/// "Multiples" promo. Empty or missing becomes "Other".
pub fn clean_group_label(label: Option<&str>) -> String {
    let Some(label) = label else {
        return OTHER_GROUP.to_string();
    };
    let head = label.split("Multiples").next().unwrap_or_default();
    let cleaned = head
        .trim()
        .trim_start_matches('>')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        OTHER_GROUP.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceTokens, SelectionRole};

    fn raw(text: &str, prices: &[&str]) -> RawCandidate {
        RawCandidate {
            text: text.to_string(),
            name_parts: Vec::new(),
            time_hint: None,
            live_hint: false,
            prices: PriceTokens::Single(prices.iter().map(|p| p.to_string()).collect()),
            link: None,
            group_label: Some("Premier League".to_string()),
        }
    }

    #[test]
    fn scheduled_three_way_row() {
        let ev = normalize(
            &raw("Today 15:00 Arsenal v Chelsea", &["2.0", "3.5", "4.0"]),
            Category::Football,
            SourceFamily::Sportsbook,
        )
        .unwrap();
        assert_eq!(ev.display_name, "Arsenal v Chelsea");
        assert_eq!(ev.scheduled_time.as_deref(), Some("Today 15:00"));
        assert!(!ev.is_live);
        assert_eq!(ev.status, LifecycleStatus::Upcoming);
        assert_eq!(ev.selections.len(), 3);
        assert_eq!(ev.selections[0].label, "Arsenal");
        assert_eq!(ev.selections[1].label, "Draw");
        assert_eq!(ev.selections[2].label, "Chelsea");
        assert_eq!(ev.selections[2].back, Some(4.0));
        assert!(ev.selections.iter().all(|s| s.lay.is_none()));
    }

    #[test]
    fn in_play_row_is_live() {
        let ev = normalize(
            &raw("In-Play Barcelona v Real Madrid", &["1.8", "4.2"]),
            Category::Football,
            SourceFamily::Exchange,
        )
        .unwrap();
        assert!(ev.is_live);
        assert_eq!(ev.status, LifecycleStatus::Live);
        assert_eq!(ev.scheduled_time, None);
        assert_eq!(ev.display_name, "Barcelona v Real Madrid");
        assert_eq!(ev.selections.len(), 2);
        assert_eq!(ev.selections[0].role, SelectionRole::Home);
        assert_eq!(ev.selections[1].role, SelectionRole::Away);
    }

    #[test]
    fn explicit_schedule_beats_live_hint() {
        let mut candidate = raw("Tomorrow 20:00 Celtic v Rangers", &["1.5", "4.0", "6.0"]);
        candidate.live_hint = true;
        let ev = normalize(&candidate, Category::Football, SourceFamily::Exchange).unwrap();
        assert!(!ev.is_live);
        assert_eq!(ev.scheduled_time.as_deref(), Some("Tomorrow 20:00"));
    }

    #[test]
    fn time_hint_counts_as_schedule() {
        let mut candidate = raw("Leeds v Hull", &["2.0", "3.0", "4.0"]);
        candidate.time_hint = Some(" 19:45 ".to_string());
        let ev = normalize(&candidate, Category::Football, SourceFamily::Exchange).unwrap();
        assert_eq!(ev.scheduled_time.as_deref(), Some("19:45"));
    }

    #[test]
    fn at_form_row_keeps_at_in_display_name() {
        let ev = normalize(
            &raw("Orlando Magic @ Miami Heat", &["2.4", "1.6"]),
            Category::Basketball,
            SourceFamily::Sportsbook,
        )
        .unwrap();
        assert_eq!(ev.display_name, "Orlando Magic @ Miami Heat");
        assert_eq!(ev.selections[0].label, "Orlando Magic");
        assert_eq!(ev.selections[0].role, SelectionRole::Away);
        assert_eq!(ev.selections[1].label, "Miami Heat");
        assert_eq!(ev.selections[1].role, SelectionRole::Home);
    }

    #[test]
    fn name_parts_are_preferred_over_text() {
        let mut candidate = raw("In-Play 2 - 1 manchester utd liverpool", &["1.5", "3.0", "7.0"]);
        candidate.name_parts = vec![
            "In-Play".into(),
            "manchester utd".into(),
            "2".into(),
            "liverpool".into(),
        ];
        let ev = normalize(&candidate, Category::Football, SourceFamily::Exchange).unwrap();
        assert_eq!(ev.display_name, "Manchester Utd v Liverpool");
        assert!(ev.is_live);
    }

    #[test]
    fn unmatched_suffix_is_dropped() {
        let ev = normalize(
            &raw("Nadal v Federer 4 Unmatched", &["1.5", "2.6"]),
            Category::Tennis,
            SourceFamily::Exchange,
        )
        .unwrap();
        assert_eq!(ev.display_name, "Nadal v Federer");
    }

    #[test]
    fn rejects_rows_without_usable_names() {
        assert_eq!(
            normalize(&raw("In-Play", &["1.5", "2.6"]), Category::Tennis, SourceFamily::Exchange),
            Err(Rejection::UnresolvedName)
        );
        assert_eq!(
            normalize(&raw("15:00 AB", &["1.5"]), Category::Golf, SourceFamily::Exchange),
            Err(Rejection::NameTooShort("Ab".to_string()))
        );
    }

    #[test]
    fn group_label_cleanup() {
        assert_eq!(clean_group_label(Some("> Premier League")), "Premier League");
        assert_eq!(clean_group_label(Some("La Liga Multiples 3 legs")), "La Liga");
        assert_eq!(clean_group_label(Some("   ")), OTHER_GROUP);
        assert_eq!(clean_group_label(None), OTHER_GROUP);
    }
}
