use crate::components::models::{
    prefixed_id, strip_id_prefix, CalendarEvent, EventSourceKind, LinkedEvent, FREE_FORM_ID,
};
use crate::error::{validation_error, CalendarResult};
use crate::utils::color::{normalize_category, UNCATEGORIZED};
use crate::utils::time::{exclusive_end, flexible_date, months_between, DateRange, MonthAndYear};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored free-form event. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeFormEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(with = "flexible_date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub order: i32,
}

impl FreeFormEvent {
    /// Id as exposed to the calendar
    pub fn calendar_id(&self) -> String {
        prefixed_id(FREE_FORM_ID, &self.id)
    }

    /// Months whose buckets hold this event
    pub fn months(&self) -> Vec<MonthAndYear> {
        months_between(self.start_date, self.end_date)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start_date, exclusive_end(self.end_date))
    }

    pub fn to_calendar_event(&self) -> CalendarEvent {
        let mut event = CalendarEvent::all_day(
            self.calendar_id(),
            self.title.clone(),
            normalize_category(&self.category),
            self.start_date,
            self.end_date,
        );
        event.description = self.description.clone();
        event.order = self.order;
        event
    }

    pub fn to_linked_event(&self) -> LinkedEvent {
        LinkedEvent {
            id: self.calendar_id(),
            source: EventSourceKind::FreeForm,
            title: self.title.clone(),
            category: normalize_category(&self.category).to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            image_url: None,
            url: None,
        }
    }
}

/// Local id for either a bare UUID or a `freeform.`-prefixed calendar id
pub fn local_event_id(id: &str) -> &str {
    strip_id_prefix(FREE_FORM_ID, id).unwrap_or(id)
}

/// User input for creating or editing an event. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub category: String,
    pub description: Option<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            start_date,
            end_date,
            category: UNCATEGORIZED.to_string(),
            description: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject drafts that could never be stored
    pub fn validate(&self) -> CalendarResult<()> {
        if self.title.trim().is_empty() {
            return Err(validation_error("Event title must not be empty"));
        }
        if self.start_date > self.end_date {
            return Err(validation_error(&format!(
                "Event starts on {} but ends on {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    /// Stored form of the draft under `id`
    pub fn into_event(self, id: String, order: i32) -> FreeFormEvent {
        let description = self
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        FreeFormEvent {
            id,
            title: self.title.trim().to_string(),
            category: normalize_category(&self.category).to_string(),
            description,
            start_date: self.start_date,
            end_date: self.end_date,
            order,
        }
    }
}
