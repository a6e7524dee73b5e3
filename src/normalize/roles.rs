//! Selection role assignment: which price slot belongs to whom.

use crate::normalize::names::{NameForm, ParsedName};
use crate::normalize::odds::convert;
use crate::types::{Category, PriceTokens, Selection, SelectionRole};

pub const DRAW_LABEL: &str = "Draw";

/// Build one `Selection` per price slot.
///
/// Three slots in a three-way category are home/draw/away. Two slots follow
/// the name form: "A v B" lists the host first, "A @ B" lists the visitor
/// first. Anything else is positional. Missing names become "Selection {i}".
pub fn assign_selections(
    category: Category,
    name: &ParsedName,
    prices: &PriceTokens,
) -> Vec<Selection> {
    let slots = prices.slot_count();
    let name_at = |i: usize, slot: usize| -> String {
        name.parts
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("Selection {}", slot + 1))
    };

    // Listing order is kept; only the roles follow the name form.
    let (first, second) = match name.form {
        NameForm::At => (SelectionRole::Away, SelectionRole::Home),
        _ => (SelectionRole::Home, SelectionRole::Away),
    };

    let labelled: Vec<(String, SelectionRole)> = if slots == 3 && category.is_three_way() {
        vec![
            (name_at(0, 0), first),
            (DRAW_LABEL.to_string(), SelectionRole::Draw),
            (name_at(1, 2), second),
        ]
    } else if slots == 2 && name.form != NameForm::Single {
        vec![(name_at(0, 0), first), (name_at(1, 1), second)]
    } else {
        (0..slots)
            .map(|i| (name_at(i, i), SelectionRole::Positional(i + 1)))
            .collect()
    };

    labelled
        .into_iter()
        .enumerate()
        .map(|(i, (label, role))| Selection {
            label,
            role,
            back: prices.back(i).and_then(convert),
            lay: prices.lay(i).and_then(convert),
        })
        .collect()
}
