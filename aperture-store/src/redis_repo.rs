use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

use aperture_core::session::{SessionRecord, SessionResult, SessionStore};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Durable session backend: records serialized as JSON under `session:{id}`
/// keys, TTL refreshed on every save.
pub struct RedisSessionStore {
    client: RedisClient,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient, ttl_seconds: u64) -> Self {
        Self { client, ttl_seconds }
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> SessionResult<Option<SessionRecord>> {
        let raw = self.client.get_value(&Self::key(id)).await?;
        match raw {
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    // Unreadable payloads are treated as no session rather
                    // than failing the request.
                    warn!("Discarding undecodable session {}: {}", id, e);
                    self.client.delete(&Self::key(id)).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SessionRecord) -> SessionResult<()> {
        let payload = serde_json::to_string(record)?;
        self.client
            .set_ex(&Self::key(&record.id), &payload, self.ttl_seconds)
            .await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        self.client.delete(&Self::key(id)).await?;
        Ok(())
    }

    async fn healthy(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
