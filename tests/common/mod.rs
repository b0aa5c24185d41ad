#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use team_calendar::components::capacity::{CapacityRecord, CapacityService, Iteration, Team, TeamContext, TeamMember};
use team_calendar::components::store::{KeyValueStore, StoreScope};
use team_calendar::error::{not_found_error, transport_error, CalendarResult};
use team_calendar::utils::time::DateRange;
use tokio::sync::{Mutex, Notify};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Inclusive date range helper
pub fn range(start: NaiveDate, end_inclusive: NaiveDate) -> DateRange {
    DateRange::from_inclusive(start, end_inclusive).unwrap()
}

/// In-memory key-value store with failure injection
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<(String, StoreScope), String>>>,
    failing_reads: Arc<Mutex<HashSet<String>>>,
    failing_writes: Arc<Mutex<HashSet<String>>>,
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    read_log: Arc<Mutex<Vec<String>>>,
    writes: Arc<AtomicUsize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.data
            .lock()
            .await
            .insert((key.to_string(), StoreScope::Default), value.to_string());
    }

    pub async fn insert_json<T: Serialize>(&self, key: &str, value: &T) {
        self.insert_raw(key, &serde_json::to_string(value).unwrap()).await;
    }

    pub async fn raw(&self, key: &str, scope: StoreScope) -> Option<String> {
        self.data.lock().await.get(&(key.to_string(), scope)).cloned()
    }

    pub async fn json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw(key, StoreScope::Default)
            .await
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub async fn fail_reads(&self, key: &str) {
        self.failing_reads.lock().await.insert(key.to_string());
    }

    pub async fn fail_writes(&self, key: &str) {
        self.failing_writes.lock().await.insert(key.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing_reads.lock().await.clear();
        self.failing_writes.lock().await.clear();
    }

    /// Hold reads of `key` until the returned gate is notified
    pub async fn gate(&self, key: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().await.insert(key.to_string(), Arc::clone(&gate));
        gate
    }

    pub async fn reads_of(&self, key: &str) -> usize {
        self.read_log.lock().await.iter().filter(|read| *read == key).count()
    }

    pub async fn read_count(&self) -> usize {
        self.read_log.lock().await.len()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get_value(&self, key: &str, scope: StoreScope) -> CalendarResult<Option<String>> {
        self.read_log.lock().await.push(key.to_string());

        let gate = self.gates.lock().await.get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing_reads.lock().await.contains(key) {
            return Err(transport_error(&format!("Mock read of {} failed", key)));
        }

        Ok(self.data.lock().await.get(&(key.to_string(), scope)).cloned())
    }

    async fn set_value(&self, key: &str, value: String, scope: StoreScope) -> CalendarResult<()> {
        if self.failing_writes.lock().await.contains(key) {
            return Err(transport_error(&format!("Mock write of {} failed", key)));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.lock().await.insert((key.to_string(), scope), value);
        Ok(())
    }
}

/// Team the plain `add_iteration` scripts data for
pub const DEFAULT_TEAM: &str = "team-1";

/// Scripted capacity service answering per team
#[derive(Default)]
pub struct MockCapacityService {
    iterations: Mutex<Vec<(String, Iteration)>>,
    capacity: Mutex<HashMap<(String, String), Vec<CapacityRecord>>>,
    failing_capacity: Mutex<HashSet<String>>,
    fail_iterations: AtomicBool,
    teams: Mutex<Vec<Team>>,
    iteration_gates: Mutex<HashMap<String, Arc<Notify>>>,
    iteration_calls: AtomicUsize,
    capacity_calls: Mutex<Vec<String>>,
}

impl MockCapacityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_iteration(&self, iteration: Iteration, records: Vec<CapacityRecord>) {
        self.add_team_iteration(DEFAULT_TEAM, iteration, records).await;
    }

    pub async fn add_team_iteration(&self, team_id: &str, iteration: Iteration, records: Vec<CapacityRecord>) {
        self.capacity
            .lock()
            .await
            .insert((team_id.to_string(), iteration.id.clone()), records);
        self.iterations.lock().await.push((team_id.to_string(), iteration));
    }

    pub async fn add_team(&self, id: &str, name: &str) {
        self.teams.lock().await.push(Team {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub async fn fail_capacity(&self, iteration_id: &str) {
        self.failing_capacity.lock().await.insert(iteration_id.to_string());
    }

    pub async fn clear_capacity_failures(&self) {
        self.failing_capacity.lock().await.clear();
    }

    pub fn fail_iterations(&self, fail: bool) {
        self.fail_iterations.store(fail, Ordering::SeqCst);
    }

    /// Hold iteration listings of `team_id` until the returned gate is notified
    pub async fn gate_iterations(&self, team_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.iteration_gates
            .lock()
            .await
            .insert(team_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn iteration_calls(&self) -> usize {
        self.iteration_calls.load(Ordering::SeqCst)
    }

    pub async fn capacity_calls_for(&self, iteration_id: &str) -> usize {
        self.capacity_calls
            .lock()
            .await
            .iter()
            .filter(|id| *id == iteration_id)
            .count()
    }
}

#[async_trait]
impl CapacityService for MockCapacityService {
    async fn get_iterations(&self, _project_id: &str, team_id: &str, range: DateRange) -> CalendarResult<Vec<Iteration>> {
        self.iteration_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.iteration_gates.lock().await.get(team_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_iterations.load(Ordering::SeqCst) {
            return Err(transport_error("Mock iteration listing failed"));
        }

        Ok(self
            .iterations
            .lock()
            .await
            .iter()
            .filter(|(team, iteration)| team == team_id && iteration.overlaps(&range))
            .map(|(_, iteration)| iteration.clone())
            .collect())
    }

    async fn get_capacity(&self, _project_id: &str, team_id: &str, iteration_id: &str) -> CalendarResult<Vec<CapacityRecord>> {
        self.capacity_calls.lock().await.push(iteration_id.to_string());

        if self.failing_capacity.lock().await.contains(iteration_id) {
            return Err(transport_error(&format!("Mock capacity of {} failed", iteration_id)));
        }

        Ok(self
            .capacity
            .lock()
            .await
            .get(&(team_id.to_string(), iteration_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_teams(&self, _project_id: &str) -> CalendarResult<Vec<Team>> {
        Ok(self.teams.lock().await.clone())
    }

    async fn get_team(&self, _project_id: &str, team_id: &str) -> CalendarResult<Team> {
        self.teams
            .lock()
            .await
            .iter()
            .find(|team| team.id == team_id)
            .cloned()
            .ok_or_else(|| not_found_error(&format!("Team {} not found", team_id)))
    }

    async fn get_team_members(&self, _project_id: &str, _team_id: &str) -> CalendarResult<Vec<TeamMember>> {
        Ok(Vec::new())
    }
}

pub fn iteration(id: &str, name: &str, start: NaiveDate, end: NaiveDate) -> Iteration {
    Iteration {
        id: id.to_string(),
        name: name.to_string(),
        path: format!("Fabrikam\\{}", name),
        start_date: start,
        end_date: end,
        url: String::new(),
    }
}

pub fn days_off(member_id: &str, name: &str, start: NaiveDate, end: NaiveDate) -> CapacityRecord {
    CapacityRecord {
        member_id: member_id.to_string(),
        member_display_name: name.to_string(),
        member_avatar_url: format!("https://avatars.example/{}", member_id),
        start_date: start,
        end_date: end,
    }
}

pub fn team_context(team_id: &str) -> TeamContext {
    TeamContext {
        host_url: "https://dev.azure.com/contoso/".to_string(),
        project_id: "project-1".to_string(),
        project_name: "Fabrikam".to_string(),
        team_id: team_id.to_string(),
        team_name: format!("Team {}", team_id),
    }
}
