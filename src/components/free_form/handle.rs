use super::actor::{FreeFormActor, FreeFormActorHandle};
use super::cache::{CommitMode, FreeFormShared};
use super::models::{local_event_id, EventDraft, FreeFormEvent};
use crate::components::models::{CalendarEvent, EventCategory};
use crate::components::store::{get_json, keys, KeyValueStore, StoreScope};
use crate::error::CalendarResult;
use crate::utils::time::{DateRange, MonthAndYear};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle for reading and editing a team's free-form events
#[derive(Clone)]
pub struct FreeFormEventsHandle {
    shared: Arc<FreeFormShared>,
    store: Arc<dyn KeyValueStore>,
    actor_handle: FreeFormActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl FreeFormEventsHandle {
    /// Create a new handle and spawn the actor
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let shared = Arc::new(FreeFormShared::new());
        let (mut actor, actor_handle) = FreeFormActor::new(Arc::clone(&shared), Arc::clone(&store));

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            shared,
            store,
            actor_handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Bind to a team. Drops the cache and invalidates work issued for the previous team.
    pub fn initialize(&self, team_id: impl Into<String>) {
        let ticket = self.shared.rebind(team_id.into());
        info!("Free-form events bound to team {}", ticket.team_id);
    }

    /// Team currently bound, if any
    pub fn team_id(&self) -> Option<String> {
        self.shared.state.read().ticket().map(|ticket| ticket.team_id)
    }

    /// Fetch the month buckets of `range` that are not cached yet.
    ///
    /// Buckets that fail to load stay uncached and are retried by the next
    /// preload. Returns the number of buckets added to the cache.
    pub async fn preload(&self, range: DateRange) -> usize {
        let (ticket, missing) = {
            let state = self.shared.state.read();
            let Some(ticket) = state.ticket() else {
                warn!("Skipping free-form preload: no team selected");
                return 0;
            };
            let missing: Vec<MonthAndYear> = range
                .months()
                .into_iter()
                .filter(|month| state.bucket(month).is_none())
                .collect();
            (ticket, missing)
        };

        if missing.is_empty() {
            debug!("Free-form buckets for {} already cached", range);
            return 0;
        }

        let fetches = missing.iter().map(|month| {
            let key = keys::free_form_bucket(&ticket.team_id, month);
            async move {
                let result = get_json::<Vec<FreeFormEvent>>(self.store.as_ref(), &key, StoreScope::Default).await;
                (*month, key, result)
            }
        });

        let mut loaded = Vec::new();
        for (month, key, result) in join_all(fetches).await {
            match result {
                Ok(events) => loaded.push((month, events.unwrap_or_default())),
                Err(e) if e.is_recoverable_fetch() => warn!("Leaving bucket {} uncached: {}", key, e),
                Err(e) => error!("Failed to load bucket {}: {}", key, e),
            }
        }

        let count = loaded.len();
        if !self.shared.commit(&ticket, loaded, CommitMode::KeepExisting) {
            debug!("Discarding free-form preload for team {}: team changed", ticket.team_id);
            return 0;
        }

        debug!("Cached {} free-form buckets for team {}", count, ticket.team_id);
        count
    }

    /// Cached events overlapping `range`, each event once
    pub fn get_events(&self, range: &DateRange) -> Vec<CalendarEvent> {
        let state = self.shared.state.read();
        state
            .unique_events()
            .filter(|event| event.overlaps(range))
            .map(FreeFormEvent::to_calendar_event)
            .collect()
    }

    /// Cached event by bare or prefixed id
    pub fn get_event(&self, id: &str) -> Option<FreeFormEvent> {
        self.shared.state.read().find(local_event_id(id)).cloned()
    }

    /// Categories of every cached event
    pub fn get_categories(&self) -> BTreeSet<String> {
        let state = self.shared.state.read();
        state
            .unique_events()
            .map(|event| event.to_linked_event().category)
            .collect()
    }

    /// Months currently held in the cache
    pub fn cached_months(&self) -> Vec<MonthAndYear> {
        self.shared.state.read().cached_months()
    }

    /// Receiver of the category summary, updated after every cache change
    pub fn get_summary_data(&self) -> watch::Receiver<Vec<EventCategory>> {
        self.shared.subscribe()
    }

    /// Add an event and return it with its new id
    pub async fn create(&self, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        draft.validate()?;
        let ticket = self.shared.ticket()?;
        self.actor_handle.create(ticket, draft).await
    }

    /// Replace an event's fields, moving it between buckets when its dates change
    pub async fn update(&self, id: &str, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        draft.validate()?;
        let ticket = self.shared.ticket()?;
        self.actor_handle
            .update(ticket, local_event_id(id).to_string(), draft)
            .await
    }

    /// Remove an event from every bucket holding it
    pub async fn delete(&self, id: &str) -> CalendarResult<()> {
        let ticket = self.shared.ticket()?;
        self.actor_handle.delete(ticket, local_event_id(id).to_string()).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalendarResult<()> {
        self.actor_handle.shutdown().await
    }
}
