mod actor;

pub use actor::{scoped_key, RedisStore, RedisStoreHandle};

use crate::error::{decode_error, CalendarResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Store keys used by the calendar
pub mod keys {
    use crate::utils::time::MonthAndYear;

    /// Flat map of category colors
    pub const EVENT_COLORS: &str = "eventColors";

    /// Month bucket of a team's free-form events
    pub fn free_form_bucket(team_id: &str, month: &MonthAndYear) -> String {
        format!("events-{}-{}", team_id, month.key())
    }

    /// Team last picked by the user in a project
    pub fn selected_team(project_id: &str) -> String {
        format!("selected-team-{}", project_id)
    }
}

/// Visibility of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreScope {
    /// Shared by everyone using the project
    Default,
    /// Private to the current user
    User,
}

/// String-keyed blob store the calendar persists into
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    async fn get_value(&self, key: &str, scope: StoreScope) -> CalendarResult<Option<String>>;

    /// Write a value, replacing whatever was there
    async fn set_value(&self, key: &str, value: String, scope: StoreScope) -> CalendarResult<()>;
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    scope: StoreScope,
) -> CalendarResult<Option<T>> {
    match store.get_value(key, scope).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| decode_error(&format!("Failed to decode {}: {}", key, e))),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn set_json<T: Serialize + ?Sized + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    scope: StoreScope,
) -> CalendarResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set_value(key, raw, scope).await
}
