//! Competitor/event name canonicalization and splitting.

use std::sync::LazyLock;

use regex::Regex;

/// Club suffixes and league acronyms that stay upper-case.
const UPPERCASE_TOKENS: &[&str] = &[
    "FC", "AFC", "NBA", "NFL", "MLB", "NHL", "USA", "UK", "II", "III", "IV", "SC", "CF", "CD",
    "AS", "AC", "PSG", "PSV", "AZ", "U19", "U21", "U23",
];

static VERSUS_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:vs\.?|v)\s+").expect("valid versus regex"));

static AT_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+@\s+").expect("valid at regex"));

/// How the participants were written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameForm {
    /// "A v B": A hosts.
    Versus,
    /// "A @ B": A visits B.
    At,
    /// One entity (race, outright, single runner).
    Single,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    pub form: NameForm,
    /// Canonical participant names in textual order.
    pub parts: Vec<String>,
}

impl ParsedName {
    pub fn display_name(&self) -> String {
        match (self.form, self.parts.as_slice()) {
            (NameForm::Versus, [a, b, ..]) => format!("{a} v {b}"),
            (NameForm::At, [a, b, ..]) => format!("{a} @ {b}"),
            _ => self.parts.join(" "),
        }
    }
}

/// Canonical casing for names. Idempotent.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(word: &str) -> String {
    let lower = word.to_lowercase();
    if matches!(lower.as_str(), "vs" | "vs." | "v") {
        return "v".to_string();
    }
    let upper = word.to_uppercase();
    if UPPERCASE_TOKENS.contains(&upper.as_str()) {
        return upper;
    }
    capitalize(word)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(word.len());
    let mut upper = first.to_uppercase();
    // Characters like 'ß' upper-case to several chars; keep them as they are
    // so a second pass produces the same string.
    if upper.len() == 1 {
        out.extend(upper.by_ref());
    } else {
        out.push(first);
    }
    out.push_str(&chars.as_str().to_lowercase());
    out
}

/// Split cleaned event text into participants.
/// Returns `None` when nothing usable remains.
pub fn parse_participants(text: &str) -> Option<ParsedName> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let versus: Vec<&str> = VERSUS_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if versus.len() >= 2 {
        return Some(ParsedName {
            form: NameForm::Versus,
            parts: versus.iter().take(2).map(|p| normalize_name(p)).collect(),
        });
    }

    let at: Vec<&str> = AT_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if at.len() >= 2 {
        return Some(ParsedName {
            form: NameForm::At,
            parts: at.iter().take(2).map(|p| normalize_name(p)).collect(),
        });
    }

    let single = normalize_name(text);
    if single.is_empty() || single == "v" {
        return None;
    }
    Some(ParsedName {
        form: NameForm::Single,
        parts: vec![single],
    })
}

/// True when the raw text uses the "@" visitor/host form.
pub fn uses_at_form(text: &str) -> bool {
    AT_SPLIT.is_match(text)
}

/// Lower-case, dash-separated form used in synthetic source identifiers.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_words_and_keeps_acronyms() {
        assert_eq!(normalize_name("manchester united fc"), "Manchester United FC");
        assert_eq!(normalize_name("ac milan VS inter"), "AC Milan v Inter");
        assert_eq!(normalize_name("  LA   lakers "), "La Lakers");
        assert_eq!(normalize_name("real madrid vs. barcelona"), "Real Madrid v Barcelona");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "manchester united fc v LIVERPOOL",
            "Vs vs. V v",
            "ßchalke psv",
            "İstanbul başakşehir",
            "o'neill (res)",
            "",
            "   ",
            "u21 england v usa",
            "ǅemal ǆ",
        ];
        for s in samples {
            let once = normalize_name(s);
            assert_eq!(normalize_name(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn versus_split_takes_first_two() {
        let parsed = parse_participants("arsenal v chelsea").unwrap();
        assert_eq!(parsed.form, NameForm::Versus);
        assert_eq!(parsed.parts, vec!["Arsenal", "Chelsea"]);
        assert_eq!(parsed.display_name(), "Arsenal v Chelsea");
    }

    #[test]
    fn at_split_keeps_textual_order() {
        let parsed = parse_participants("Orlando Magic @ Miami Heat").unwrap();
        assert_eq!(parsed.form, NameForm::At);
        assert_eq!(parsed.parts, vec!["Orlando Magic", "Miami Heat"]);
        assert_eq!(parsed.display_name(), "Orlando Magic @ Miami Heat");
    }

    #[test]
    fn single_entity_and_empty() {
        let parsed = parse_participants("14:30 cheltenham").unwrap();
        assert_eq!(parsed.form, NameForm::Single);
        assert_eq!(parsed.parts, vec!["14:30 Cheltenham"]);
        assert!(parse_participants("   ").is_none());
        assert!(parse_participants("v").is_none());
    }

    #[test]
    fn slug_is_url_safe() {
        assert_eq!(slug("Tiger Woods (USA)"), "tiger-woods-usa");
        assert_eq!(slug("  --Rory  McIlroy-- "), "rory-mcilroy");
    }
}
