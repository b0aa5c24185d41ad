use super::{KeyValueStore, StoreScope};
use crate::config::Config;
use crate::error::{component_error, config_error, transport_error, CalendarResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Redis key for a store key in the given scope
pub fn scoped_key(prefix: &str, user_id: &str, key: &str, scope: StoreScope) -> String {
    match scope {
        StoreScope::Default => format!("{}:{}", prefix, key),
        StoreScope::User => format!("{}:user:{}:{}", prefix, user_id, key),
    }
}

/// The Redis actor that owns the connection
pub struct RedisStore {
    client: RedisClient,
    connection: Option<ConnectionManager>,
    key_prefix: String,
    user_id: String,
    command_rx: mpsc::Receiver<RedisCommand>,
}

/// Commands that can be sent to the Redis actor
pub enum RedisCommand {
    GetValue(String, StoreScope, mpsc::Sender<CalendarResult<Option<String>>>),
    SetValue(String, String, StoreScope, mpsc::Sender<CalendarResult<()>>),
    Shutdown,
}

/// Handle for communicating with the Redis actor
#[derive(Clone)]
pub struct RedisStoreHandle {
    command_tx: mpsc::Sender<RedisCommand>,
}

impl RedisStoreHandle {
    /// Stop the actor loop
    pub async fn shutdown(&self) -> CalendarResult<()> {
        let _ = self.command_tx.send(RedisCommand::Shutdown).await;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStoreHandle {
    async fn get_value(&self, key: &str, scope: StoreScope) -> CalendarResult<Option<String>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(RedisCommand::GetValue(key.to_string(), scope, response_tx))
            .await
            .map_err(|e| component_error(&format!("Store mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Store response channel closed"))?
    }

    async fn set_value(&self, key: &str, value: String, scope: StoreScope) -> CalendarResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(RedisCommand::SetValue(key.to_string(), value, scope, response_tx))
            .await
            .map_err(|e| component_error(&format!("Store mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Store response channel closed"))?
    }
}

impl RedisStore {
    /// Create a new actor and return its handle
    pub fn new(config: &Config) -> CalendarResult<(Self, RedisStoreHandle)> {
        let (command_tx, command_rx) = mpsc::channel(32);

        let client = RedisClient::open(config.redis_url.as_str())
            .map_err(|e| config_error(&format!("Invalid Redis URL {}: {}", config.redis_url, e)))?;

        let actor = Self {
            client,
            connection: None,
            key_prefix: config.key_prefix.clone(),
            user_id: config.user_id.clone(),
            command_rx,
        };

        Ok((actor, RedisStoreHandle { command_tx }))
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Redis store started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                RedisCommand::GetValue(key, scope, response_tx) => {
                    let result = self.get_value(&key, scope).await;
                    let _ = response_tx.send(result).await;
                }
                RedisCommand::SetValue(key, value, scope, response_tx) => {
                    let result = self.set_value(&key, value, scope).await;
                    let _ = response_tx.send(result).await;
                }
                RedisCommand::Shutdown => {
                    info!("Redis store shutting down");
                    break;
                }
            }
        }

        info!("Redis store shut down");
    }

    /// Connection manager, created on first use and reconnecting on its own afterwards
    async fn connection(&mut self) -> CalendarResult<ConnectionManager> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }

        let connection = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| transport_error(&format!("Failed to connect to Redis: {}", e)))?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    async fn get_value(&mut self, key: &str, scope: StoreScope) -> CalendarResult<Option<String>> {
        let redis_key = scoped_key(&self.key_prefix, &self.user_id, key, scope);
        let mut connection = self.connection().await?;

        let value: Option<String> = connection
            .get(&redis_key)
            .await
            .map_err(|e| transport_error(&format!("Failed to read {} from Redis: {}", redis_key, e)))?;

        debug!("Read {} ({})", redis_key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    async fn set_value(&mut self, key: &str, value: String, scope: StoreScope) -> CalendarResult<()> {
        let redis_key = scoped_key(&self.key_prefix, &self.user_id, key, scope);
        let mut connection = self.connection().await?;

        () = connection
            .set(&redis_key, value)
            .await
            .map_err(|e| transport_error(&format!("Failed to write {} to Redis: {}", redis_key, e)))?;

        debug!("Wrote {}", redis_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_keys() {
        assert_eq!(
            scoped_key("team_calendar", "alice", "eventColors", StoreScope::Default),
            "team_calendar:eventColors"
        );
        assert_eq!(
            scoped_key("team_calendar", "alice", "selected-team-p1", StoreScope::User),
            "team_calendar:user:alice:selected-team-p1"
        );
    }
}
