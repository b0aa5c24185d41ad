use super::models::CapacityRecord;
use crate::components::models::{prefixed_id, CalendarEvent, EventIcon, DAYS_OFF_ID};
use crate::utils::color::DAYS_OFF_CATEGORY;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Everyone off on one date, in the order their records were fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedDaysOff {
    pub date: NaiveDate,
    pub members: Vec<CapacityRecord>,
}

impl GroupedDaysOff {
    pub fn event_id(&self) -> String {
        prefixed_id(DAYS_OFF_ID, &self.date.format("%Y-%m-%d").to_string())
    }

    /// Names joined for the cluster title
    pub fn title(&self) -> String {
        self.members
            .iter()
            .map(|record| record.member_display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn icons(&self) -> Vec<EventIcon> {
        self.members
            .iter()
            .map(|record| EventIcon {
                image_url: record.member_avatar_url.clone(),
                linked_event_id: record.linked_event_id(),
            })
            .collect()
    }

    /// Single-day event standing in for the whole group
    pub fn to_calendar_event(&self) -> CalendarEvent {
        let mut event = CalendarEvent::all_day(self.event_id(), self.title(), DAYS_OFF_CATEGORY, self.date, self.date);
        event.icons = self.icons();
        event
    }
}

/// Group the records covering `date`, keeping the first record of each member
pub fn group_days_off<'a, I>(records: I, date: NaiveDate) -> Option<GroupedDaysOff>
where
    I: IntoIterator<Item = &'a CapacityRecord>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut members = Vec::new();
    for record in records {
        if record.covers(date) && seen.insert(record.member_id.as_str()) {
            members.push(record.clone());
        }
    }

    if members.is_empty() {
        None
    } else {
        Some(GroupedDaysOff { date, members })
    }
}
