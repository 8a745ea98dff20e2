//! # Cadence Stores
//!
//! Backend implementations for the cadence-core storage and queue contracts:
//! - `InMemoryPlanStore` / `InMemoryDelayQueue` for development and tests
//! - `RedisPlanStore` / `RedisDelayQueue` for durable deployments

mod delay_queue;
mod plan_store;
mod redis_delay_queue;
mod redis_plan_store;

pub use delay_queue::InMemoryDelayQueue;
pub use plan_store::InMemoryPlanStore;
pub use redis_delay_queue::RedisDelayQueue;
pub use redis_plan_store::RedisPlanStore;

pub use cadence_core::queue::{DelayScheduler, Delivery, DeliveryHandle, QueueError, TriggerQueue};
pub use cadence_core::store::{PlanPatch, PlanStore, StoreError};
