mod client;
pub mod grouping;
mod handle;
pub mod models;

pub use client::{AzureDevOpsClient, API_VERSION};
pub use grouping::{group_days_off, GroupedDaysOff};
pub use handle::{CapacityEventsHandle, PreloadReport};
pub use models::{CapacityRecord, Iteration, Team, TeamContext, TeamMember};

use super::models::CalendarEvent;
use super::EventSource;
use crate::config::component_names;
use crate::error::CalendarResult;
use crate::utils::time::DateRange;
use async_trait::async_trait;
use std::any::Any;
use tracing::error;

/// Remote work-tracking service the capacity source reads from
#[async_trait]
pub trait CapacityService: Send + Sync {
    /// Iterations of the team overlapping `range`
    async fn get_iterations(&self, project_id: &str, team_id: &str, range: DateRange) -> CalendarResult<Vec<Iteration>>;

    /// Days-off records of every member for one iteration
    async fn get_capacity(&self, project_id: &str, team_id: &str, iteration_id: &str) -> CalendarResult<Vec<CapacityRecord>>;

    async fn get_teams(&self, project_id: &str) -> CalendarResult<Vec<Team>>;

    async fn get_team(&self, project_id: &str, team_id: &str) -> CalendarResult<Team>;

    async fn get_team_members(&self, project_id: &str, team_id: &str) -> CalendarResult<Vec<TeamMember>>;
}

/// Current name of a team, or `last_known` when the lookup fails
pub async fn resolve_team_name(
    service: &dyn CapacityService,
    project_id: &str,
    team_id: &str,
    last_known: &str,
) -> String {
    match service.get_team(project_id, team_id).await {
        Ok(team) => team.name,
        Err(e) => {
            error!("Failed to get team with ID {}: {}", team_id, e);
            last_known.to_string()
        }
    }
}

#[async_trait]
impl EventSource for CapacityEventsHandle {
    fn name(&self) -> &'static str {
        component_names::CAPACITY_EVENTS
    }

    fn events(&self, range: &DateRange) -> Vec<CalendarEvent> {
        self.get_events(range)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
