use super::cache::{CommitMode, FreeFormShared, Ticket};
use super::models::{EventDraft, FreeFormEvent};
use crate::components::store::{get_json, keys, set_json, KeyValueStore, StoreScope};
use crate::error::{component_error, CalendarResult};
use crate::utils::time::MonthAndYear;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

type Buckets = BTreeMap<MonthAndYear, Vec<FreeFormEvent>>;

/// The actor that applies free-form mutations one at a time
pub struct FreeFormActor {
    shared: Arc<FreeFormShared>,
    store: Arc<dyn KeyValueStore>,
    command_rx: mpsc::Receiver<FreeFormCommand>,
}

/// Commands that can be sent to the free-form actor
pub enum FreeFormCommand {
    Create(Ticket, EventDraft, mpsc::Sender<CalendarResult<FreeFormEvent>>),
    Update(Ticket, String, EventDraft, mpsc::Sender<CalendarResult<FreeFormEvent>>),
    Delete(Ticket, String, mpsc::Sender<CalendarResult<()>>),
    Shutdown,
}

/// Handle for communicating with the free-form actor
#[derive(Clone)]
pub struct FreeFormActorHandle {
    command_tx: mpsc::Sender<FreeFormCommand>,
}

impl FreeFormActorHandle {
    pub async fn create(&self, ticket: Ticket, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(FreeFormCommand::Create(ticket, draft, response_tx))
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    pub async fn update(&self, ticket: Ticket, id: String, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(FreeFormCommand::Update(ticket, id, draft, response_tx))
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    pub async fn delete(&self, ticket: Ticket, id: String) -> CalendarResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(FreeFormCommand::Delete(ticket, id, response_tx))
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }

    pub async fn shutdown(&self) -> CalendarResult<()> {
        let _ = self.command_tx.send(FreeFormCommand::Shutdown).await;
        Ok(())
    }
}

impl FreeFormActor {
    /// Create a new actor and return its handle
    pub fn new(shared: Arc<FreeFormShared>, store: Arc<dyn KeyValueStore>) -> (Self, FreeFormActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            shared,
            store,
            command_rx,
        };

        (actor, FreeFormActorHandle { command_tx })
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Free-form events actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                FreeFormCommand::Create(ticket, draft, response_tx) => {
                    let result = self.create(&ticket, draft).await;
                    let _ = response_tx.send(result).await;
                }
                FreeFormCommand::Update(ticket, id, draft, response_tx) => {
                    let result = self.update(&ticket, &id, draft).await;
                    let _ = response_tx.send(result).await;
                }
                FreeFormCommand::Delete(ticket, id, response_tx) => {
                    let result = self.delete(&ticket, &id).await;
                    let _ = response_tx.send(result).await;
                }
                FreeFormCommand::Shutdown => {
                    info!("Free-form events actor shutting down");
                    break;
                }
            }
        }

        info!("Free-form events actor shut down");
    }

    async fn create(&self, ticket: &Ticket, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        let order = {
            let state = self.shared.state.read();
            if !state.is_current(ticket) {
                return Err(component_error("Team changed before the change was applied"));
            }
            state.next_order(draft.start_date)
        };

        let event = draft.into_event(Uuid::new_v4().to_string(), order);
        let months: BTreeSet<MonthAndYear> = event.months().into_iter().collect();

        let before = self.load_buckets(ticket, &months).await?;
        let mut after = before.clone();
        for month in &months {
            after.entry(*month).or_default().push(event.clone());
        }

        self.write_buckets(ticket, &before, &after).await?;
        self.finish(ticket, after);

        info!("Created event {} ({}) for team {}", event.id, event.title, ticket.team_id);
        Ok(event)
    }

    async fn update(&self, ticket: &Ticket, id: &str, draft: EventDraft) -> CalendarResult<FreeFormEvent> {
        let (existing, cached_months) = self.shared.find_event(ticket, id)?;
        let updated = draft.into_event(existing.id.clone(), existing.order);

        let target: BTreeSet<MonthAndYear> = updated.months().into_iter().collect();
        let mut months = cached_months;
        months.extend(existing.months());
        months.extend(target.iter().copied());

        let before = self.load_buckets(ticket, &months).await?;
        let mut after = before.clone();
        for (month, events) in after.iter_mut() {
            let position = events.iter().position(|event| event.id == updated.id);
            match (position, target.contains(month)) {
                (Some(index), true) => events[index] = updated.clone(),
                (Some(index), false) => {
                    events.remove(index);
                }
                (None, true) => events.push(updated.clone()),
                (None, false) => {}
            }
        }

        self.write_buckets(ticket, &before, &after).await?;
        self.finish(ticket, after);

        info!("Updated event {} for team {}", updated.id, ticket.team_id);
        Ok(updated)
    }

    async fn delete(&self, ticket: &Ticket, id: &str) -> CalendarResult<()> {
        let (existing, cached_months) = self.shared.find_event(ticket, id)?;

        let mut months = cached_months;
        months.extend(existing.months());

        let before = self.load_buckets(ticket, &months).await?;
        let mut after = before.clone();
        for events in after.values_mut() {
            events.retain(|event| event.id != existing.id);
        }

        self.write_buckets(ticket, &before, &after).await?;
        self.finish(ticket, after);

        info!("Deleted event {} for team {}", existing.id, ticket.team_id);
        Ok(())
    }

    /// Current contents of each bucket, from cache when held, otherwise from the store
    async fn load_buckets(&self, ticket: &Ticket, months: &BTreeSet<MonthAndYear>) -> CalendarResult<Buckets> {
        let mut buckets = Buckets::new();
        let mut missing = Vec::new();

        {
            let state = self.shared.state.read();
            for month in months {
                match state.bucket(month).filter(|_| state.is_current(ticket)) {
                    Some(events) => {
                        buckets.insert(*month, events.clone());
                    }
                    None => missing.push(*month),
                }
            }
        }

        for month in missing {
            let key = keys::free_form_bucket(&ticket.team_id, &month);
            let events = get_json::<Vec<FreeFormEvent>>(self.store.as_ref(), &key, StoreScope::Default)
                .await?
                .unwrap_or_default();
            debug!("Loaded bucket {} with {} events", key, events.len());
            buckets.insert(month, events);
        }

        Ok(buckets)
    }

    /// Write every changed bucket, restoring the earlier ones if a later write fails
    async fn write_buckets(&self, ticket: &Ticket, before: &Buckets, after: &Buckets) -> CalendarResult<()> {
        let changed: Vec<MonthAndYear> = after
            .iter()
            .filter(|(month, events)| before.get(*month) != Some(*events))
            .map(|(month, _)| *month)
            .collect();

        let mut written: Vec<MonthAndYear> = Vec::new();
        for month in changed {
            let key = keys::free_form_bucket(&ticket.team_id, &month);
            let events = after.get(&month).map(Vec::as_slice).unwrap_or_default();

            if let Err(e) = set_json(self.store.as_ref(), &key, events, StoreScope::Default).await {
                error!("Failed to write bucket {}: {}", key, e);
                self.roll_back(ticket, before, &written).await;
                return Err(e);
            }
            written.push(month);
        }

        Ok(())
    }

    async fn roll_back(&self, ticket: &Ticket, before: &Buckets, written: &[MonthAndYear]) {
        for month in written {
            let key = keys::free_form_bucket(&ticket.team_id, month);
            let events = before.get(month).map(Vec::as_slice).unwrap_or_default();

            match set_json(self.store.as_ref(), &key, events, StoreScope::Default).await {
                Ok(()) => debug!("Rolled back bucket {}", key),
                Err(e) => error!("Failed to roll back bucket {}: {}", key, e),
            }
        }
    }

    fn finish(&self, ticket: &Ticket, buckets: Buckets) {
        if !self.shared.commit(ticket, buckets, CommitMode::Overwrite) {
            debug!("Team changed while writing for team {}, cache left alone", ticket.team_id);
        }
    }
}
