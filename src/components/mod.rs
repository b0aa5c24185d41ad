use crate::error::CalendarResult;
use crate::utils::color::{resolve_color, ColorOverrides};
use crate::utils::time::DateRange;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use tracing::{error, info};

// Export components
pub mod capacity;
pub mod free_form;
pub mod models;
pub mod store;
pub mod summary;

pub use capacity::CapacityEventsHandle;
pub use free_form::FreeFormEventsHandle;
pub use models::CalendarEvent;

/// Event source trait that every calendar source implements
#[async_trait]
pub trait EventSource: Send + Sync + Any {
    /// Get the name of the source
    fn name(&self) -> &'static str;

    /// Cached events overlapping `range`. Never blocks on I/O.
    fn events(&self, range: &DateRange) -> Vec<CalendarEvent>;

    /// Shutdown the source
    async fn shutdown(&self) -> CalendarResult<()> {
        Ok(())
    }

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Merged view over all registered sources
pub struct CalendarFeed {
    sources: Vec<Box<dyn EventSource>>,
    color_overrides: ColorOverrides,
}

impl fmt::Debug for CalendarFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarFeed")
            .field("source_count", &self.sources.len())
            .field("color_overrides", &self.color_overrides)
            .finish()
    }
}

impl Default for CalendarFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarFeed {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            color_overrides: ColorOverrides::new(),
        }
    }

    /// Register a source
    pub fn register<T: EventSource + 'static>(&mut self, source: T) {
        info!("Registering event source: {}", source.name());
        self.sources.push(Box::new(source));
    }

    pub fn set_color_overrides(&mut self, overrides: ColorOverrides) {
        self.color_overrides = overrides;
    }

    pub fn color_overrides(&self) -> &ColorOverrides {
        &self.color_overrides
    }

    /// Events of every source overlapping `range`, colored and in render order
    pub fn events(&self, range: &DateRange) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self
            .sources
            .iter()
            .flat_map(|source| source.events(range))
            .collect();

        for event in &mut events {
            event.color = Some(resolve_color(&event.category, &self.color_overrides));
        }

        sort_for_render(&mut events);
        events
    }

    /// Get a source by name
    pub fn get_source_by_name(&self, name: &str) -> Option<&dyn EventSource> {
        self.sources
            .iter()
            .find(|source| source.name() == name)
            .map(|source| source.as_ref())
    }

    /// Get a source by its concrete type
    pub fn get_source<T: EventSource + 'static>(&self) -> Option<&T> {
        self.sources
            .iter()
            .find_map(|source| source.as_any().downcast_ref::<T>())
    }

    /// Shutdown all sources
    pub async fn shutdown_all(&self) -> CalendarResult<()> {
        info!("Shutting down all event sources");

        for source in &self.sources {
            info!("Shutting down event source: {}", source.name());

            if let Err(e) = source.shutdown().await {
                // Log error but continue with other sources
                error!("Error shutting down event source {}: {:?}", source.name(), e);
            }
        }

        Ok(())
    }
}

/// Order events by start, then stacking order, longer first, all-day first, then title
pub fn sort_for_render(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.order.cmp(&b.order))
            .then_with(|| b.duration_days().cmp(&a.duration_days()))
            .then_with(|| b.all_day.cmp(&a.all_day))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
}
