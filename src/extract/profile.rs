use scraper::Selector;

use crate::error::{AppError, Result};
use crate::types::SourceFamily;

/// Where the prices of a row live.
#[derive(Debug, Clone, Copy)]
pub enum PriceLayout {
    /// Parallel back and lay button columns.
    BackLay {
        back: &'static str,
        lay: &'static str,
    },
    /// One button per selection.
    Single { buttons: &'static str },
}

/// Declarative description of one page family's markup. Only selectors live
/// here; the walking logic is shared.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionProfile {
    pub event_link: &'static str,
    pub heading: &'static str,
    pub prices: PriceLayout,
    /// Inner element holding the price text inside a button, if any.
    pub price_label: &'static str,
    pub live_marker: &'static str,
    pub start_time: &'static str,
    /// Consent banners and cookie overlays; anything inside is ignored.
    pub overlay: &'static str,
    pub pagination: &'static str,
    /// How far above the event link to look for the enclosing row.
    pub max_row_depth: usize,
    /// Cap on price tokens taken per side of a row.
    pub max_tokens_per_side: usize,
}

pub const EXCHANGE_PROFILE: ExtractionProfile = ExtractionProfile {
    event_link: r#"a[href*="/market/"]"#,
    heading: ".coupon-card .header, .coupon-header, h2, h3",
    prices: PriceLayout::BackLay {
        // Class tokens `back` / `lay` or starting with `back-` / `lay-`, so
        // `feedback`, `display-row` and `player-card` never match.
        back: r#".back button, button.back, [class^="back-"] button, [class*=" back-"] button, button[class^="back-"], button[class*=" back-"]"#,
        lay: r#".lay button, button.lay, [class^="lay-"] button, [class*=" lay-"] button, button[class^="lay-"], button[class*=" lay-"]"#,
    },
    price_label: "label, span",
    live_marker: r#".inplay-icon, [class*="inplay"], [class*="in-play"]"#,
    start_time: r#".start-time, [class*="start-time"], time"#,
    overlay: r#"#onetrust-consent-sdk, [id*="consent"], [class*="cookie"]"#,
    pagination: r#".pagination, [class*="pagination"]"#,
    max_row_depth: 8,
    max_tokens_per_side: 3,
};

pub const SPORTSBOOK_PROFILE: ExtractionProfile = ExtractionProfile {
    event_link: r#"a[href*="/e-"]"#,
    heading: r#"a[href*="/c-"], h2, h3"#,
    prices: PriceLayout::Single { buttons: "button" },
    price_label: "label, span",
    live_marker: r#".inplay-icon, [class*="inplay"], [class*="in-play"]"#,
    start_time: r#".start-time, [class*="start-time"], time"#,
    overlay: r#"#onetrust-consent-sdk, [id*="consent"], [class*="cookie"]"#,
    pagination: r#".pagination, [class*="pagination"]"#,
    max_row_depth: 8,
    max_tokens_per_side: 6,
};

impl ExtractionProfile {
    pub fn for_family(family: SourceFamily) -> &'static ExtractionProfile {
        match family {
            SourceFamily::Exchange => &EXCHANGE_PROFILE,
            SourceFamily::Sportsbook => &SPORTSBOOK_PROFILE,
        }
    }

    pub fn compile(&self) -> Result<CompiledProfile> {
        let prices = match self.prices {
            PriceLayout::BackLay { back, lay } => CompiledPrices::BackLay {
                back: parse_selector(back)?,
                lay: parse_selector(lay)?,
            },
            PriceLayout::Single { buttons } => CompiledPrices::Single {
                buttons: parse_selector(buttons)?,
            },
        };
        Ok(CompiledProfile {
            event_link: parse_selector(self.event_link)?,
            heading: parse_selector(self.heading)?,
            prices,
            price_label: parse_selector(self.price_label)?,
            live_marker: parse_selector(self.live_marker)?,
            start_time: parse_selector(self.start_time)?,
            overlay: parse_selector(self.overlay)?,
            max_row_depth: self.max_row_depth,
            max_tokens_per_side: self.max_tokens_per_side,
        })
    }
}

pub enum CompiledPrices {
    BackLay { back: Selector, lay: Selector },
    Single { buttons: Selector },
}

/// Selectors parsed once per page.
pub struct CompiledProfile {
    pub event_link: Selector,
    pub heading: Selector,
    pub prices: CompiledPrices,
    pub price_label: Selector,
    pub live_marker: Selector,
    pub start_time: Selector,
    pub overlay: Selector,
    pub max_row_depth: usize,
    pub max_tokens_per_side: usize,
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Extraction(format!("bad selector {css:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_profiles_compile() {
        assert!(EXCHANGE_PROFILE.compile().is_ok());
        assert!(SPORTSBOOK_PROFILE.compile().is_ok());
        assert!(parse_selector(EXCHANGE_PROFILE.pagination).is_ok());
    }

    #[test]
    fn malformed_selector_is_an_extraction_error() {
        assert!(matches!(parse_selector("a[["), Err(AppError::Extraction(_))));
        assert!(matches!(parse_selector(":::"), Err(AppError::Extraction(_))));
    }

    #[test]
    fn price_columns_match_whole_class_tokens() {
        let html = scraper::Html::parse_fragment(
            r#"<div class="display-row player-card feedback">
                 <div class="back-cell"><button id="b1">2.0</button></div>
                 <div class="runner lay-cell"><button id="l1">2.02</button></div>
                 <button class="bf-button back-button" id="b2">3.5</button>
               </div>"#,
        );
        let (back, lay) = match EXCHANGE_PROFILE.compile().unwrap().prices {
            CompiledPrices::BackLay { back, lay } => (back, lay),
            CompiledPrices::Single { .. } => panic!("exchange profile is back/lay"),
        };
        let ids = |sel: &Selector| -> Vec<String> {
            html.select(sel)
                .filter_map(|b| b.value().attr("id").map(str::to_string))
                .collect()
        };
        assert_eq!(ids(&back), vec!["b1", "b2"]);
        assert_eq!(ids(&lay), vec!["l1"]);
    }
}
