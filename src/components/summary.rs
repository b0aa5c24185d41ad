use crate::components::models::{EventCategory, LinkedEvent};
use crate::utils::color::{default_color, normalize_category, ColorOverrides};
use crate::utils::time::format_date_range;
use rust_i18n::t;
use std::collections::HashMap;

/// Key a summary groups entries by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Free-form events, one row per category
    Category,
    /// Iterations and days off, one row per title
    Title,
}

/// Collapse linked entries into summary rows.
///
/// Entries inside a row are ordered by start date. Rows are ordered by their
/// earliest entry, then title.
pub fn project_summary(entries: &[LinkedEvent], group_by: GroupBy) -> Vec<EventCategory> {
    let mut groups: Vec<(String, Vec<LinkedEvent>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = match group_by {
            GroupBy::Category => normalize_category(&entry.category).to_string(),
            GroupBy::Title => entry.title.clone(),
        };

        match index.get(&key) {
            Some(&position) => groups[position].1.push(entry.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![entry.clone()]));
            }
        }
    }

    let mut summary: Vec<EventCategory> = groups
        .into_iter()
        .map(|(title, linked)| build_row(title, linked, group_by))
        .collect();

    summary.sort_by(|a, b| {
        let a_start = a.linked_event().map(|e| e.start_date);
        let b_start = b.linked_event().map(|e| e.start_date);
        a_start.cmp(&b_start).then_with(|| a.title.cmp(&b.title))
    });
    summary
}

fn build_row(title: String, mut linked: Vec<LinkedEvent>, group_by: GroupBy) -> EventCategory {
    linked.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.end_date.cmp(&b.end_date))
            .then_with(|| a.id.cmp(&b.id))
    });

    let event_count = linked.len();
    let sub_title = match linked.as_slice() {
        [only] => format_date_range(only.start_date, only.end_date),
        _ => t!("summary_event_count", count = event_count).to_string(),
    };

    let image_url = linked.iter().find_map(|e| e.image_url.clone());
    let url = linked.iter().find_map(|e| e.url.clone());
    let color = match group_by {
        GroupBy::Category => Some(default_color(&title)),
        GroupBy::Title => linked.first().map(|e| default_color(&e.category)),
    };

    EventCategory {
        title,
        sub_title,
        event_count,
        color,
        image_url,
        url,
        linked_events: linked,
    }
}

/// Swatch for a row with user overrides applied
pub fn display_color(row: &EventCategory, overrides: &ColorOverrides) -> Option<String> {
    if let Some(color) = overrides.get(row.title.as_str()) {
        return Some(color.clone());
    }

    row.linked_event()
        .and_then(|first| overrides.get(normalize_category(&first.category)))
        .cloned()
        .or_else(|| row.color.clone())
}
