use std::collections::{HashMap, HashSet};

use crate::normalize::names::slug;
use crate::types::{Category, NormalizedEvent, OrderedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Link(String),
    Name(Category, String),
}

/// Drops rows already seen earlier in the run and stamps display order.
/// One assigner lives for one category of one run.
pub struct DedupAssigner {
    category: Category,
    seen: HashSet<DedupKey>,
}

impl DedupAssigner {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            seen: HashSet::new(),
        }
    }

    /// Number of distinct events kept so far.
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    /// Assign identities to one page worth of records.
    ///
    /// `fallback_url` stands in for the link when a row has none.
    /// `order_offset` is the number of records kept on earlier pages, so
    /// `relative_order` keeps increasing across pages.
    pub fn assign(
        &mut self,
        records: Vec<NormalizedEvent>,
        fallback_url: &str,
        order_offset: usize,
    ) -> Vec<OrderedEvent> {
        let shared = shared_links(&records);
        let mut kept = Vec::with_capacity(records.len());

        for event in records {
            let (key, source_identifier) = match event.link.as_deref() {
                Some(link) if !shared.contains(link) => {
                    (DedupKey::Link(link.to_string()), link.to_string())
                }
                link => {
                    let name_slug = slug(&event.display_name);
                    let base = link.unwrap_or(fallback_url);
                    (
                        DedupKey::Name(self.category, event.display_name.to_lowercase()),
                        format!("{base}#{name_slug}"),
                    )
                }
            };
            if !self.seen.insert(key) {
                continue;
            }
            let relative_order = (order_offset + kept.len()) as i64;
            kept.push(OrderedEvent {
                event,
                source_identifier,
                relative_order,
            });
        }
        kept
    }
}

/// Links that several differently named rows point at on the same page
/// (a tournament page rather than an event page).
fn shared_links(records: &[NormalizedEvent]) -> HashSet<String> {
    let mut names_by_link: HashMap<&str, HashSet<&str>> = HashMap::new();
    for event in records {
        if let Some(link) = event.link.as_deref() {
            names_by_link
                .entry(link)
                .or_default()
                .insert(event.display_name.as_str());
        }
    }
    names_by_link
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(link, _)| link.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LifecycleStatus, SourceFamily};

    const PAGE: &str = "https://www.example.test/exchange/football-betting-1";

    fn event(name: &str, link: Option<&str>) -> NormalizedEvent {
        NormalizedEvent {
            category: Category::Football,
            family: SourceFamily::Exchange,
            group_label: "Premier League".to_string(),
            display_name: name.to_string(),
            scheduled_time: None,
            is_live: false,
            status: LifecycleStatus::Upcoming,
            link: link.map(str::to_string),
            selections: Vec::new(),
        }
    }

    fn page() -> Vec<NormalizedEvent> {
        vec![
            event("Arsenal v Chelsea", Some("https://x.test/market/1")),
            event("Leeds v Hull", Some("https://x.test/market/2")),
            event("Celtic v Rangers", None),
        ]
    }

    #[test]
    fn same_page_twice_counts_once() {
        let mut assigner = DedupAssigner::new(Category::Football);
        let first = assigner.assign(page(), PAGE, 0);
        assert_eq!(first.len(), 3);
        let second = assigner.assign(page(), PAGE, assigner.unique_count());
        assert!(second.is_empty());
        assert_eq!(assigner.unique_count(), 3);
    }

    #[test]
    fn order_continues_across_pages() {
        let mut assigner = DedupAssigner::new(Category::Football);
        let first = assigner.assign(page(), PAGE, 0);
        let offset = assigner.unique_count();
        let second = assigner.assign(
            vec![
                event("Arsenal v Chelsea", Some("https://x.test/market/1")),
                event("Lazio v Roma", Some("https://x.test/market/3")),
            ],
            PAGE,
            offset,
        );
        let orders: Vec<i64> = first
            .iter()
            .chain(second.iter())
            .map(|e| e.relative_order)
            .collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
        assert_eq!(second[0].event.display_name, "Lazio v Roma");
    }

    #[test]
    fn rows_without_links_get_slugged_identifiers() {
        let mut assigner = DedupAssigner::new(Category::Football);
        let kept = assigner.assign(page(), PAGE, 0);
        assert_eq!(kept[0].source_identifier, "https://x.test/market/1");
        assert_eq!(kept[2].source_identifier, format!("{PAGE}#celtic-v-rangers"));
    }

    #[test]
    fn shared_tournament_link_splits_by_name() {
        let mut assigner = DedupAssigner::new(Category::Golf);
        let shared = "https://x.test/market/open-championship";
        let kept = assigner.assign(
            vec![
                event("Rory Mcilroy", Some(shared)),
                event("Tiger Woods", Some(shared)),
                event("Rory Mcilroy", Some(shared)),
            ],
            PAGE,
            0,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_identifier, format!("{shared}#rory-mcilroy"));
        assert_eq!(kept[1].source_identifier, format!("{shared}#tiger-woods"));
    }
}
