use crate::utils::time::{exclusive_end, flexible_date, DateRange};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Id prefix of free-form events
pub const FREE_FORM_ID: &str = "freeform";
/// Id prefix of days-off entries
pub const DAYS_OFF_ID: &str = "daysoff";
/// Id prefix of iteration entries
pub const ITERATION_ID: &str = "iteration";

/// Join a source prefix and a local id
pub fn prefixed_id(prefix: &str, id: &str) -> String {
    format!("{}.{}", prefix, id)
}

/// Local part of a prefixed id, if it carries `prefix`
pub fn strip_id_prefix<'a>(prefix: &str, id: &'a str) -> Option<&'a str> {
    id.strip_prefix(prefix)?.strip_prefix('.')
}

/// Avatar shown on a clustered event, pointing back at the underlying entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIcon {
    pub image_url: String,
    pub linked_event_id: String,
}

/// How an event is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventDisplay {
    #[default]
    Auto,
    Background,
}

/// Render-ready calendar event. `end_date` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(with = "flexible_date")]
    pub end_date: NaiveDate,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_all_day")]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<EventIcon>,
    #[serde(default)]
    pub display: EventDisplay,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_all_day() -> bool {
    true
}

impl CalendarEvent {
    /// All-day event covering `[start, end_inclusive]`
    pub fn all_day(
        id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        start: NaiveDate,
        end_inclusive: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_date: start,
            end_date: exclusive_end(end_inclusive),
            category: category.into(),
            description: None,
            all_day: true,
            icons: Vec::new(),
            display: EventDisplay::Auto,
            order: 0,
            color: None,
        }
    }

    /// Length in days
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Last day the event covers
    pub fn inclusive_end(&self) -> NaiveDate {
        self.end_date
            .pred_opt()
            .filter(|day| *day >= self.start_date)
            .unwrap_or(self.start_date)
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start_date, self.end_date)
    }
}

/// Which source produced a summary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventSourceKind {
    FreeForm,
    DaysOff,
    Iteration,
}

/// Entity a summary row links back to. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedEvent {
    pub id: String,
    pub source: EventSourceKind,
    pub title: String,
    pub category: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(with = "flexible_date")]
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One row of a summary panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCategory {
    pub title: String,
    pub sub_title: String,
    pub event_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub linked_events: Vec<LinkedEvent>,
}

impl EventCategory {
    /// Earliest entry of the group
    pub fn linked_event(&self) -> Option<&LinkedEvent> {
        self.linked_events.first()
    }

    /// Rows with more than one entry can be expanded
    pub fn is_expandable(&self) -> bool {
        self.event_count > 1
    }
}
