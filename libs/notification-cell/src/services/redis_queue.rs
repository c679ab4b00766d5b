use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::{AppointmentEvent, NotificationDispatcher, NotificationError, NotificationTopic};

/// Events older than this are dropped from the topic list if no worker consumed them.
const QUEUE_TTL_SECONDS: i64 = 604800;

/// Pushes events onto one Redis list per topic for the notification worker.
pub struct RedisNotificationDispatcher {
    pool: Pool,
    dispatched: AtomicU64,
}

impl std::fmt::Debug for RedisNotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNotificationDispatcher")
            .field("dispatched", &self.dispatched)
            .finish_non_exhaustive()
    }
}

impl RedisNotificationDispatcher {
    pub async fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| NotificationError::PoolError(format!("Pool creation error: {}", e)))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| NotificationError::PoolError(format!("Connection error: {}", e)))?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification dispatcher initialized successfully");

        Ok(Self {
            pool,
            dispatched: AtomicU64::new(0),
        })
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::PoolError(e.to_string()))
    }

    /// Number of events pushed since start-up.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationDispatcher for RedisNotificationDispatcher {
    async fn dispatch(
        &self,
        topic: NotificationTopic,
        event: &AppointmentEvent,
    ) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;
        let queue_key = topic.queue_key();

        let mut conn = self.get_connection().await?;
        let _: () = conn.lpush(&queue_key, payload).await?;
        let _: () = conn.expire(&queue_key, QUEUE_TTL_SECONDS).await?;

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Event for appointment {} delivered to topic {}",
            event.appointment_id, topic
        );
        Ok(())
    }
}
