use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{AppError, RedisConfig};

/// Shared Redis handle. Cloning is cheap: the connection manager multiplexes
/// one underlying connection.
#[derive(Clone)]
pub struct RedisService {
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &RedisConfig) -> Result<Self, AppError> {
        let client = Client::open(config.connection_string()).map_err(AppError::Redis)?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(AppError::Redis)?;

        // Test connection
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(AppError::Redis)?;

        tracing::info!("Redis connection established");

        Ok(Self { manager })
    }

    /// Serialize `value` as JSON and store it under `key` with a TTL.
    pub async fn set_with_expiry<T>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<(), AppError>
    where
        T: Serialize,
    {
        let mut conn = self.manager.clone();
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))?;

        conn.set_ex(key, serialized, ttl_seconds)
            .await
            .map_err(AppError::Redis)
    }

    pub async fn cache_get<T>(&self, key: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.manager.clone();
        let result: Option<String> = conn.get(key).await.map_err(AppError::Redis)?;

        match result {
            Some(data) => {
                let deserialized = serde_json::from_str(&data)
                    .map_err(|e| AppError::Internal(format!("Deserialization error: {}", e)))?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub async fn cache_delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        conn.del(key).await.map_err(AppError::Redis)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(AppError::Redis)?;
        Ok(())
    }
}

// Redis key builders
pub struct RedisKeys;

impl RedisKeys {
    pub fn booking_report(fingerprint: &str) -> String {
        format!("analytics:bookings:report:{}", fingerprint)
    }
}
