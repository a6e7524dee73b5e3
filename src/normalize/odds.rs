//! Odds token → decimal price conversion.

use std::sync::LazyLock;

use regex::Regex;

static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d+\s*/\s*\d+|\d+(?:\.\d+)?|-|evs|evens)$").expect("valid price regex")
});

/// True when `text` looks like something a price button would show:
/// fractional, decimal, the evens marker or the "-" placeholder.
pub fn is_price_token(text: &str) -> bool {
    PRICE_TOKEN.is_match(text.trim())
}

/// Convert a displayed odds token to a decimal price.
///
/// `"N/D"` → `N/D + 1` rounded to 2 places, `EVS`/`EVENS` → 2.00, decimals pass
/// through. Placeholders and anything unparseable give `None`.
pub fn convert(token: &str) -> Option<f64> {
    let token = token.trim().to_uppercase();
    if token.is_empty() || token == "-" {
        return None;
    }
    if token == "EVS" || token == "EVENS" {
        return Some(2.00);
    }

    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 || !num.is_finite() || !den.is_finite() {
            return None;
        }
        return Some(round2(num / den + 1.0));
    }

    let value: f64 = token.parse().ok()?;
    value.is_finite().then_some(value)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
