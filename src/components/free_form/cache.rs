use super::models::FreeFormEvent;
use crate::components::models::EventCategory;
use crate::components::summary::{project_summary, GroupBy};
use crate::error::{component_error, not_found_error, CalendarResult};
use crate::utils::time::MonthAndYear;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::watch;

/// Team binding a piece of work was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub team_id: String,
    pub epoch: u64,
}

/// How fetched buckets land in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Preload results never replace a bucket that is already cached
    KeepExisting,
    /// Mutation results replace the cached bucket
    Overwrite,
}

#[derive(Debug, Default)]
pub struct FreeFormState {
    team_id: Option<String>,
    epoch: u64,
    buckets: BTreeMap<MonthAndYear, Vec<FreeFormEvent>>,
}

impl FreeFormState {
    pub fn ticket(&self) -> Option<Ticket> {
        self.team_id.as_ref().map(|team_id| Ticket {
            team_id: team_id.clone(),
            epoch: self.epoch,
        })
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.epoch == ticket.epoch
    }

    pub fn bucket(&self, month: &MonthAndYear) -> Option<&Vec<FreeFormEvent>> {
        self.buckets.get(month)
    }

    pub fn cached_months(&self) -> Vec<MonthAndYear> {
        self.buckets.keys().copied().collect()
    }

    /// Every cached event once, in month order
    pub fn unique_events(&self) -> impl Iterator<Item = &FreeFormEvent> {
        let mut seen = HashSet::new();
        self.buckets
            .values()
            .flatten()
            .filter(move |event| seen.insert(event.id.clone()))
    }

    pub fn find(&self, id: &str) -> Option<&FreeFormEvent> {
        self.buckets.values().flatten().find(|event| event.id == id)
    }

    /// Cached months holding a copy of the event
    pub fn months_containing(&self, id: &str) -> BTreeSet<MonthAndYear> {
        self.buckets
            .iter()
            .filter(|(_, events)| events.iter().any(|event| event.id == id))
            .map(|(month, _)| *month)
            .collect()
    }

    /// Stacking slot for a new event starting on `date`
    pub fn next_order(&self, date: NaiveDate) -> i32 {
        let stacked = self.unique_events().filter(|event| event.covers(date)).count();
        i32::try_from(stacked).unwrap_or(i32::MAX)
    }
}

/// Cache shared by the handle (reads, preload) and the actor (mutations)
#[derive(Debug)]
pub struct FreeFormShared {
    pub state: RwLock<FreeFormState>,
    summary_tx: watch::Sender<Vec<EventCategory>>,
}

impl FreeFormShared {
    pub fn new() -> Self {
        let (summary_tx, _) = watch::channel(Vec::new());
        Self {
            state: RwLock::new(FreeFormState::default()),
            summary_tx,
        }
    }

    pub fn ticket(&self) -> CalendarResult<Ticket> {
        self.state
            .read()
            .ticket()
            .ok_or_else(|| component_error("Free-form events are not bound to a team"))
    }

    /// Drop everything cached and bind to `team_id`
    pub fn rebind(&self, team_id: String) -> Ticket {
        let ticket = {
            let mut state = self.state.write();
            state.epoch += 1;
            state.team_id = Some(team_id.clone());
            state.buckets.clear();
            Ticket {
                team_id,
                epoch: state.epoch,
            }
        };
        self.publish_summary();
        ticket
    }

    /// Stored copy of an event, failing for stale tickets or unknown ids
    pub fn find_event(&self, ticket: &Ticket, id: &str) -> CalendarResult<(FreeFormEvent, BTreeSet<MonthAndYear>)> {
        let state = self.state.read();
        if !state.is_current(ticket) {
            return Err(component_error("Team changed before the change was applied"));
        }
        let event = state
            .find(id)
            .cloned()
            .ok_or_else(|| not_found_error(&format!("Event {} is not loaded", id)))?;
        Ok((event, state.months_containing(id)))
    }

    /// Apply buckets if the ticket still matches. Returns false when discarded.
    pub fn commit<I>(&self, ticket: &Ticket, buckets: I, mode: CommitMode) -> bool
    where
        I: IntoIterator<Item = (MonthAndYear, Vec<FreeFormEvent>)>,
    {
        {
            let mut state = self.state.write();
            if !state.is_current(ticket) {
                return false;
            }
            for (month, events) in buckets {
                match mode {
                    CommitMode::KeepExisting => {
                        state.buckets.entry(month).or_insert(events);
                    }
                    CommitMode::Overwrite => {
                        state.buckets.insert(month, events);
                    }
                }
            }
        }
        self.publish_summary();
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<EventCategory>> {
        self.summary_tx.subscribe()
    }

    pub fn publish_summary(&self) {
        let linked: Vec<_> = {
            let state = self.state.read();
            state.unique_events().map(FreeFormEvent::to_linked_event).collect()
        };
        self.summary_tx
            .send_replace(project_summary(&linked, GroupBy::Category));
    }
}

impl Default for FreeFormShared {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::free_form::models::EventDraft;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn event(id: &str, start: NaiveDate, end: NaiveDate) -> FreeFormEvent {
        EventDraft::new(id, start, end).into_event(id.to_string(), 0)
    }

    #[test]
    fn test_stale_commit_is_discarded() {
        let shared = FreeFormShared::new();
        let old = shared.rebind("team-a".to_string());
        shared.rebind("team-b".to_string());

        let march = MonthAndYear::new(2024, 3).unwrap();
        let applied = shared.commit(&old, vec![(march, vec![event("a", date(3, 1), date(3, 1))])], CommitMode::Overwrite);

        assert!(!applied);
        assert!(shared.state.read().cached_months().is_empty());
    }

    #[test]
    fn test_keep_existing_does_not_replace() {
        let shared = FreeFormShared::new();
        let ticket = shared.rebind("team-a".to_string());
        let march = MonthAndYear::new(2024, 3).unwrap();

        shared.commit(&ticket, vec![(march, vec![event("new", date(3, 1), date(3, 1))])], CommitMode::Overwrite);
        shared.commit(&ticket, vec![(march, Vec::new())], CommitMode::KeepExisting);

        assert_eq!(shared.state.read().bucket(&march).map(Vec::len), Some(1));
    }

    #[test]
    fn test_unique_events_across_buckets() {
        let shared = FreeFormShared::new();
        let ticket = shared.rebind("team-a".to_string());
        let spanning = event("span", date(1, 30), date(2, 2));
        let jan = MonthAndYear::new(2024, 1).unwrap();
        let feb = MonthAndYear::new(2024, 2).unwrap();

        shared.commit(
            &ticket,
            vec![(jan, vec![spanning.clone()]), (feb, vec![spanning])],
            CommitMode::Overwrite,
        );

        let state = shared.state.read();
        assert_eq!(state.unique_events().count(), 1);
        assert_eq!(state.months_containing("span").len(), 2);
        assert_eq!(state.next_order(date(2, 1)), 1);
        assert_eq!(state.next_order(date(2, 5)), 0);
    }

    #[test]
    fn test_summary_follows_commits() {
        let shared = FreeFormShared::new();
        let receiver = shared.subscribe();
        let ticket = shared.rebind("team-a".to_string());
        let march = MonthAndYear::new(2024, 3).unwrap();

        shared.commit(&ticket, vec![(march, vec![event("a", date(3, 1), date(3, 1))])], CommitMode::Overwrite);
        assert_eq!(receiver.borrow().len(), 1);

        shared.rebind("team-b".to_string());
        assert!(receiver.borrow().is_empty());
    }
}
