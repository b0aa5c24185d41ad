use crate::components::models::{
    prefixed_id, CalendarEvent, EventDisplay, EventSourceKind, LinkedEvent, DAYS_OFF_ID, ITERATION_ID,
};
use crate::utils::color::{DAYS_OFF_CATEGORY, ITERATION_CATEGORY};
use crate::utils::time::{exclusive_end, flexible_date, DateRange};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

/// Project and team the capacity source reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamContext {
    pub host_url: String,
    pub project_id: String,
    pub project_name: String,
    pub team_id: String,
    pub team_name: String,
}

impl TeamContext {
    /// Web page listing the team's iterations
    pub fn iterations_url(&self) -> Option<String> {
        self.web_url(&["_sprints", "taskboard", &self.team_name])
    }

    /// Web page with the team's capacity planning
    pub fn capacity_url(&self) -> Option<String> {
        self.web_url(&["_sprints", "capacity", &self.team_name])
    }

    /// Task board of one iteration
    pub fn iteration_board_url(&self, iteration: &Iteration) -> Option<String> {
        if iteration.path.is_empty() {
            return self.iterations_url();
        }
        let mut segments = vec!["_sprints", "taskboard", self.team_name.as_str()];
        segments.extend(iteration.path.split('\\').filter(|part| !part.is_empty()));
        self.web_url(&segments)
    }

    fn web_url(&self, segments: &[&str]) -> Option<String> {
        let mut url = Url::parse(&self.host_url).ok()?;
        {
            let mut path = url.path_segments_mut().ok()?;
            path.pop_if_empty();
            path.push(&self.project_name);
            path.extend(segments);
        }
        Some(url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub unique_name: Option<String>,
}

/// Named time-box of the team. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(with = "flexible_date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub url: String,
}

impl Iteration {
    pub fn event_id(&self) -> String {
        prefixed_id(ITERATION_ID, &self.id)
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start_date, exclusive_end(self.end_date))
    }

    /// Background band spanning the iteration
    pub fn to_calendar_event(&self) -> CalendarEvent {
        let mut event = CalendarEvent::all_day(
            self.event_id(),
            self.name.clone(),
            ITERATION_CATEGORY,
            self.start_date,
            self.end_date,
        );
        event.display = EventDisplay::Background;
        event
    }

    pub fn to_linked_event(&self, url: Option<String>) -> LinkedEvent {
        LinkedEvent {
            id: self.event_id(),
            source: EventSourceKind::Iteration,
            title: self.name.clone(),
            category: ITERATION_CATEGORY.to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            image_url: None,
            url: url.or_else(|| Some(self.url.clone()).filter(|url| !url.is_empty())),
        }
    }
}

/// One member's days-off entry. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRecord {
    pub member_id: String,
    pub member_display_name: String,
    #[serde(default)]
    pub member_avatar_url: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(with = "flexible_date")]
    pub end_date: NaiveDate,
}

impl CapacityRecord {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start_date, exclusive_end(self.end_date))
    }

    /// Id icons use to point back at this record
    pub fn linked_event_id(&self) -> String {
        format!(
            "{}.{}.{}",
            DAYS_OFF_ID,
            self.start_date.format("%Y-%m-%d"),
            self.member_id
        )
    }

    pub fn to_linked_event(&self, url: Option<String>) -> LinkedEvent {
        LinkedEvent {
            id: self.linked_event_id(),
            source: EventSourceKind::DaysOff,
            title: self.member_display_name.clone(),
            category: DAYS_OFF_CATEGORY.to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            image_url: Some(self.member_avatar_url.clone()).filter(|url| !url.is_empty()),
            url,
        }
    }
}
