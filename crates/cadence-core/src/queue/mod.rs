//! Queue module
//!
//! The delayed trigger transport, split along its two roles:
//! - `DelayScheduler`: enqueue a trigger that becomes deliverable no earlier
//!   than a given duration from now ("no earlier than", not "exactly at")
//! - `TriggerQueue`: the consumer side; a delivery not acknowledged within
//!   its visibility window becomes visible again (at-least-once)
//!
//! Because delivery is at-least-once, every consumer of a trigger must treat
//! its own invocation as possibly-duplicate.
//!
//! Note: Implementations are in the cadence-stores crate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::PlanTrigger;

/// Queue error types
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Receipt returned when a trigger is scheduled
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    /// Earliest instant the trigger can be delivered
    pub delivery_time: DateTime<Utc>,
    /// Transport-assigned message identifier
    pub delivery_id: String,
}

/// One in-flight delivery handed to the consumer
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The trigger payload
    pub trigger: PlanTrigger,
    /// Transport-assigned message identifier
    pub delivery_id: String,
    /// 1-based delivery attempt (grows on redelivery)
    pub attempt: u32,
}

/// Producer side: arm a delayed trigger
#[async_trait]
pub trait DelayScheduler: Send + Sync {
    /// Enqueue `trigger` so it is delivered no earlier than `not_before`
    async fn schedule(
        &self,
        trigger: PlanTrigger,
        not_before: Duration,
    ) -> Result<DeliveryHandle, QueueError>;
}

/// Consumer side: receive and acknowledge deliveries
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    /// Take the next due trigger, if any, making it invisible to other
    /// consumers for `visibility`; expired in-flight triggers redeliver
    async fn receive(&self, visibility: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Positively acknowledge a delivery, removing it from the queue
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError>;
}
