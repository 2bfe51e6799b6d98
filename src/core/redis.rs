use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Shared Redis connection manager. The service stays up when Redis is
/// unreachable; callers get the degraded answers documented per method.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(reply) if reply == "PONG" => RedisHealth::Healthy,
            Ok(reply) => RedisHealth::Unhealthy(format!("unexpected ping reply: {reply}")),
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Returns `Ok(None)` when the connection is down.
    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(None);
        };

        cmd("GET").arg(key).query_async::<_, Option<String>>(&mut manager).await
    }

    /// Returns `Ok(false)` without writing when the connection is down.
    pub(crate) async fn put(&self, key: &str, value: &str) -> Result<bool, RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(false);
        };

        cmd("SET").arg(key).arg(value).query_async::<_, ()>(&mut manager).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};

    #[tokio::test]
    async fn disconnected_handle_degrades_gracefully() {
        let redis = RedisHandle::new("redis://127.0.0.1:6399/0".to_string());

        assert_eq!(redis.health().await, RedisHealth::Disconnected);
        assert_eq!(redis.get("exam-violations/t1/u1").await.expect("get"), None);
        assert!(!redis.put("exam-violations/t1/u1", "{}").await.expect("put"));
    }
}
