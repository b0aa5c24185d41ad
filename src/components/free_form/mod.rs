mod actor;
mod cache;
mod handle;
pub mod models;

pub use handle::FreeFormEventsHandle;
pub use models::{EventDraft, FreeFormEvent};

use super::models::CalendarEvent;
use super::EventSource;
use crate::config::component_names;
use crate::error::CalendarResult;
use crate::utils::time::DateRange;
use async_trait::async_trait;
use std::any::Any;

#[async_trait]
impl EventSource for FreeFormEventsHandle {
    fn name(&self) -> &'static str {
        component_names::FREE_FORM_EVENTS
    }

    fn events(&self, range: &DateRange) -> Vec<CalendarEvent> {
        self.get_events(range)
    }

    async fn shutdown(&self) -> CalendarResult<()> {
        FreeFormEventsHandle::shutdown(self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
