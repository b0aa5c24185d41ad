use super::grouping::{group_days_off, GroupedDaysOff};
use super::models::{CapacityRecord, Iteration, TeamContext};
use super::CapacityService;
use crate::components::models::{CalendarEvent, EventCategory};
use crate::components::summary::{project_summary, GroupBy};
use crate::utils::time::{DateRange, MonthAndYear};
use chrono::NaiveDate;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of one iteration preload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Iterations added to the cache
    pub iterations_fetched: usize,
    /// Iterations whose capacity was added to the cache
    pub capacity_fetched: usize,
    /// Iterations whose capacity could not be fetched
    pub failed_iterations: Vec<String>,
    /// Whether listing iterations failed
    pub iterations_failed: bool,
    /// Whether the results were dropped because the team changed
    pub discarded: bool,
}

#[derive(Debug)]
struct IterationCapacity {
    iteration_id: String,
    records: Vec<CapacityRecord>,
}

#[derive(Debug, Default)]
struct CapacityState {
    context: Option<TeamContext>,
    epoch: u64,
    fetched_months: BTreeSet<MonthAndYear>,
    iterations: Vec<Iteration>,
    capacity: Vec<IterationCapacity>,
    failed_iterations: HashSet<String>,
}

impl CapacityState {
    /// Every cached record, iterations in fetch order
    fn records(&self) -> impl Iterator<Item = &CapacityRecord> {
        self.capacity.iter().flat_map(|entry| entry.records.iter())
    }

    fn has_capacity(&self, iteration_id: &str) -> bool {
        self.capacity.iter().any(|entry| entry.iteration_id == iteration_id)
    }
}

struct CapacityShared {
    state: RwLock<CapacityState>,
    iteration_summary_tx: watch::Sender<Vec<EventCategory>>,
    capacity_summary_tx: watch::Sender<Vec<EventCategory>>,
    iteration_url_tx: watch::Sender<String>,
    capacity_url_tx: watch::Sender<String>,
}

/// Handle for the team's iterations and days off
#[derive(Clone)]
pub struct CapacityEventsHandle {
    shared: Arc<CapacityShared>,
    service: Arc<dyn CapacityService>,
    padding_days: i64,
}

impl CapacityEventsHandle {
    /// Create a handle reading from `service`, widening iteration fetches by `padding_days`
    pub fn new(service: Arc<dyn CapacityService>, padding_days: i64) -> Self {
        let (iteration_summary_tx, _) = watch::channel(Vec::new());
        let (capacity_summary_tx, _) = watch::channel(Vec::new());
        let (iteration_url_tx, _) = watch::channel(String::new());
        let (capacity_url_tx, _) = watch::channel(String::new());

        Self {
            shared: Arc::new(CapacityShared {
                state: RwLock::new(CapacityState::default()),
                iteration_summary_tx,
                capacity_summary_tx,
                iteration_url_tx,
                capacity_url_tx,
            }),
            service,
            padding_days,
        }
    }

    /// Bind to a team. Drops the cache and invalidates fetches issued for the previous team.
    pub fn initialize(&self, context: TeamContext) {
        info!("Capacity events bound to team {} ({})", context.team_name, context.team_id);
        {
            let mut state = self.shared.state.write();
            state.epoch += 1;
            state.context = Some(context);
            state.fetched_months.clear();
            state.iterations.clear();
            state.capacity.clear();
            state.failed_iterations.clear();
        }
        self.publish_urls();
        self.publish_summaries();
    }

    /// Replace the display name of the bound team
    pub fn set_team_name(&self, team_name: impl Into<String>) {
        {
            let mut state = self.shared.state.write();
            match state.context.as_mut() {
                Some(context) => context.team_name = team_name.into(),
                None => return,
            }
        }
        self.publish_urls();
        self.publish_summaries();
    }

    pub fn team_context(&self) -> Option<TeamContext> {
        self.shared.state.read().context.clone()
    }

    /// Fetch iterations around `range` and the capacity of those not cached yet.
    ///
    /// Iteration listing is skipped when every padded month was already fetched.
    /// Failures are logged once per call and leave the cache as it was for the
    /// failed parts.
    pub async fn preload_iterations(&self, range: DateRange) -> PreloadReport {
        let mut report = PreloadReport::default();
        let padded = range.padded(self.padding_days);

        let (context, epoch, missing_months) = {
            let state = self.shared.state.read();
            let Some(context) = state.context.clone() else {
                warn!("Skipping capacity preload: no team selected");
                return report;
            };
            let missing: Vec<MonthAndYear> = padded
                .months()
                .into_iter()
                .filter(|month| !state.fetched_months.contains(month))
                .collect();
            (context, state.epoch, missing)
        };

        let mut fresh: Vec<Iteration> = Vec::new();
        let mut iteration_error = None;
        if let (Some(first), Some(last)) = (missing_months.first(), missing_months.last()) {
            let fetch_range = DateRange::months_span(*first, *last).unwrap_or(padded);
            match self
                .service
                .get_iterations(&context.project_id, &context.team_id, fetch_range)
                .await
            {
                Ok(iterations) => fresh = iterations,
                Err(e) => {
                    report.iterations_failed = true;
                    iteration_error = Some(e);
                }
            }
        } else {
            debug!("Iterations around {} already fetched", range);
        }

        let targets: Vec<Iteration> = {
            let state = self.shared.state.read();
            if state.epoch != epoch {
                report.discarded = true;
                return report;
            }
            let mut seen = HashSet::new();
            state
                .iterations
                .iter()
                .chain(fresh.iter())
                .filter(|iteration| iteration.overlaps(&padded))
                .filter(|iteration| !state.has_capacity(&iteration.id))
                .filter(|iteration| !state.failed_iterations.contains(&iteration.id))
                .filter(|iteration| seen.insert(iteration.id.clone()))
                .cloned()
                .collect()
        };

        let results = join_all(targets.iter().map(|iteration| {
            self.service
                .get_capacity(&context.project_id, &context.team_id, &iteration.id)
        }))
        .await;

        let mut capacity_errors = Vec::new();
        {
            let mut state = self.shared.state.write();
            if state.epoch != epoch {
                debug!("Discarding capacity preload for team {}: team changed", context.team_id);
                report.discarded = true;
                return report;
            }

            if !report.iterations_failed {
                state.fetched_months.extend(missing_months.iter().copied());
            }
            for iteration in fresh {
                if !state.iterations.iter().any(|cached| cached.id == iteration.id) {
                    state.iterations.push(iteration);
                    report.iterations_fetched += 1;
                }
            }
            for (iteration, result) in targets.into_iter().zip(results) {
                match result {
                    Ok(records) => {
                        if !state.has_capacity(&iteration.id) {
                            state.capacity.push(IterationCapacity {
                                iteration_id: iteration.id,
                                records,
                            });
                            report.capacity_fetched += 1;
                        }
                    }
                    Err(e) => {
                        debug!("Capacity of iteration {} failed: {}", iteration.name, e);
                        state.failed_iterations.insert(iteration.id.clone());
                        report.failed_iterations.push(iteration.id);
                        capacity_errors.push(e);
                    }
                }
            }
        }

        if let Some(e) = iteration_error {
            warn!("Failed to load iterations of team {}: {}", context.team_name, e);
        } else if let Some(first) = capacity_errors.first() {
            warn!(
                "Capacity unavailable for {} iteration(s) of team {}: {}",
                capacity_errors.len(),
                context.team_name,
                first
            );
        }

        self.publish_summaries();
        report
    }

    /// Iteration bands and clustered days off overlapping `range`, from cache only
    pub fn get_events(&self, range: &DateRange) -> Vec<CalendarEvent> {
        let state = self.shared.state.read();

        let mut events: Vec<CalendarEvent> = state
            .iterations
            .iter()
            .filter(|iteration| iteration.overlaps(range))
            .map(Iteration::to_calendar_event)
            .collect();

        let records: Vec<&CapacityRecord> = state.records().filter(|record| record.overlaps(range)).collect();
        if !records.is_empty() {
            events.extend(
                range
                    .days()
                    .filter_map(|date| group_days_off(records.iter().copied(), date))
                    .map(|group| group.to_calendar_event()),
            );
        }

        events
    }

    /// Everyone off on `date`
    pub fn get_grouped_event_for_date(&self, date: NaiveDate) -> Option<GroupedDaysOff> {
        let state = self.shared.state.read();
        group_days_off(state.records(), date)
    }

    /// Record an icon points at
    pub fn get_capacity_record(&self, linked_event_id: &str) -> Option<CapacityRecord> {
        let state = self.shared.state.read();
        let found = state
            .records()
            .find(|record| record.linked_event_id() == linked_event_id)
            .cloned();
        found
    }

    /// Cached iterations in fetch order
    pub fn get_iterations(&self) -> Vec<Iteration> {
        self.shared.state.read().iterations.clone()
    }

    pub fn get_iteration_summary_data(&self) -> watch::Receiver<Vec<EventCategory>> {
        self.shared.iteration_summary_tx.subscribe()
    }

    pub fn get_capacity_summary_data(&self) -> watch::Receiver<Vec<EventCategory>> {
        self.shared.capacity_summary_tx.subscribe()
    }

    /// Link to the team's iteration page, empty before a team is bound
    pub fn get_iteration_url(&self) -> watch::Receiver<String> {
        self.shared.iteration_url_tx.subscribe()
    }

    /// Link to the team's capacity page, empty before a team is bound
    pub fn get_capacity_url(&self) -> watch::Receiver<String> {
        self.shared.capacity_url_tx.subscribe()
    }

    fn publish_urls(&self) {
        let (iteration_url, capacity_url) = {
            let state = self.shared.state.read();
            match &state.context {
                Some(context) => (
                    context.iterations_url().unwrap_or_default(),
                    context.capacity_url().unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            }
        };
        self.shared.iteration_url_tx.send_replace(iteration_url);
        self.shared.capacity_url_tx.send_replace(capacity_url);
    }

    fn publish_summaries(&self) {
        let (iterations, days_off) = {
            let state = self.shared.state.read();

            let iterations: Vec<_> = state
                .iterations
                .iter()
                .map(|iteration| {
                    let url = state
                        .context
                        .as_ref()
                        .and_then(|context| context.iteration_board_url(iteration));
                    iteration.to_linked_event(url)
                })
                .collect();

            let capacity_url = state.context.as_ref().and_then(TeamContext::capacity_url);
            let mut seen = HashSet::new();
            let days_off: Vec<_> = state
                .records()
                .filter(|record| seen.insert((record.member_id.clone(), record.start_date, record.end_date)))
                .map(|record| record.to_linked_event(capacity_url.clone()))
                .collect();

            (iterations, days_off)
        };

        self.shared
            .iteration_summary_tx
            .send_replace(project_summary(&iterations, GroupBy::Title));
        self.shared
            .capacity_summary_tx
            .send_replace(project_summary(&days_off, GroupBy::Title));
    }
}
