//! Delayed trigger queue - Redis implementation.
//!
//! Two sorted sets carry the lifecycle:
//! - `{prefix}:triggers:pending` scored by visible-at millis
//! - `{prefix}:triggers:inflight` scored by redelivery-deadline millis
//!
//! `receive` first reclaims expired in-flight entries, then claims one due
//! trigger with ZREM; the removal succeeding for exactly one caller is what
//! gives single-claimant delivery. An unacknowledged claim sits in the
//! in-flight set until its deadline passes and is then redelivered.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;

use cadence_core::queue::{DelayScheduler, Delivery, DeliveryHandle, QueueError, TriggerQueue};
use cadence_core::types::PlanTrigger;

/// Redis implementation of the delayed trigger transport.
pub struct RedisDelayQueue {
    client: redis::Client,
    key_prefix: String,
}

impl RedisDelayQueue {
    /// Create a new Redis delay queue from a connection URL.
    pub fn new(connection_url: &str, key_prefix: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn pending_key(&self) -> String {
        format!("{}:triggers:pending", self.key_prefix)
    }

    fn inflight_key(&self) -> String {
        format!("{}:triggers:inflight", self.key_prefix)
    }

    fn payload_key(&self) -> String {
        format!("{}:triggers:payload", self.key_prefix)
    }

    fn attempts_key(&self) -> String {
        format!("{}:triggers:attempts", self.key_prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    async fn reclaim_expired(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        now_ms: i64,
    ) -> Result<(), QueueError> {
        let expired: Vec<String> = conn
            .zrangebyscore(self.inflight_key(), "-inf", now_ms)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        for id in expired {
            let removed: i64 = conn
                .zrem(self.inflight_key(), &id)
                .await
                .map_err(|e| QueueError::Connection(e.to_string()))?;
            if removed == 1 {
                tracing::debug!(trigger_id = %id, "reclaiming expired in-flight trigger");
                conn.zadd::<_, _, _, ()>(self.pending_key(), &id, now_ms)
                    .await
                    .map_err(|e| QueueError::Connection(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DelayScheduler for RedisDelayQueue {
    async fn schedule(
        &self,
        trigger: PlanTrigger,
        not_before: Duration,
    ) -> Result<DeliveryHandle, QueueError> {
        let delay = chrono::Duration::from_std(not_before)
            .map_err(|e| QueueError::Internal(e.to_string()))?;
        let delivery_time = Utc::now() + delay;
        let id = uuid::Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&trigger)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.connection().await?;
        conn.hset::<_, _, _, ()>(self.payload_key(), &id, payload)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        conn.zadd::<_, _, _, ()>(self.pending_key(), &id, delivery_time.timestamp_millis())
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(DeliveryHandle {
            delivery_time,
            delivery_id: id,
        })
    }
}

#[async_trait]
impl TriggerQueue for RedisDelayQueue {
    async fn receive(&self, visibility: Duration) -> Result<Option<Delivery>, QueueError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut conn = self.connection().await?;

        self.reclaim_expired(&mut conn, now_ms).await?;

        let due: Vec<String> = conn
            .zrangebyscore_limit(self.pending_key(), "-inf", now_ms, 0, 1)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let Some(id) = due.into_iter().next() else {
            return Ok(None);
        };

        // ZREM succeeds for exactly one claimant; losers try again next poll.
        let claimed: i64 = conn
            .zrem(self.pending_key(), &id)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        if claimed != 1 {
            return Ok(None);
        }

        let deadline_ms = now_ms + visibility.as_millis() as i64;
        conn.zadd::<_, _, _, ()>(self.inflight_key(), &id, deadline_ms)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let attempt: i64 = conn
            .hincr(self.attempts_key(), &id, 1)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let payload: Option<String> = conn
            .hget(self.payload_key(), &id)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let Some(payload) = payload else {
            return Err(QueueError::Internal(format!(
                "trigger {} has no payload",
                id
            )));
        };
        let trigger: PlanTrigger = serde_json::from_str(&payload)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        Ok(Some(Delivery {
            trigger,
            delivery_id: id,
            attempt: attempt.max(1) as u32,
        }))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        conn.zrem::<_, _, ()>(self.inflight_key(), &delivery.delivery_id)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        conn.hdel::<_, _, ()>(self.payload_key(), &delivery.delivery_id)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        conn.hdel::<_, _, ()>(self.attempts_key(), &delivery.delivery_id)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(())
    }
}
