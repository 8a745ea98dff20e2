//! Delayed trigger queue - in-memory implementation.
//!
//! Mirrors the transport semantics the engine is written against: delayed
//! visibility, single-claimant delivery, and at-least-once redelivery when a
//! delivery is not acknowledged within its visibility window.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

use cadence_core::queue::{DelayScheduler, Delivery, DeliveryHandle, QueueError, TriggerQueue};
use cadence_core::types::PlanTrigger;

struct QueuedTrigger {
    id: String,
    trigger: PlanTrigger,
    visible_at: Instant,
    attempts: u32,
}

struct InFlightTrigger {
    id: String,
    trigger: PlanTrigger,
    redeliver_at: Instant,
    attempts: u32,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<QueuedTrigger>,
    in_flight: Vec<InFlightTrigger>,
}

/// In-memory delayed queue for development and testing.
pub struct InMemoryDelayQueue {
    state: Mutex<QueueState>,
}

impl InMemoryDelayQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Number of triggers waiting to become visible or be claimed.
    pub fn pending_len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.pending.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|e| QueueError::Internal(e.to_string()))
    }
}

impl Default for InMemoryDelayQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DelayScheduler for InMemoryDelayQueue {
    async fn schedule(
        &self,
        trigger: PlanTrigger,
        not_before: Duration,
    ) -> Result<DeliveryHandle, QueueError> {
        let delay = chrono::Duration::from_std(not_before)
            .map_err(|e| QueueError::Internal(e.to_string()))?;
        let delivery_time = Utc::now() + delay;
        let id = uuid::Uuid::new_v4().to_string();

        let mut state = self.lock()?;
        state.pending.push(QueuedTrigger {
            id: id.clone(),
            trigger,
            visible_at: Instant::now() + not_before,
            attempts: 0,
        });

        Ok(DeliveryHandle {
            delivery_time,
            delivery_id: id,
        })
    }
}

#[async_trait]
impl TriggerQueue for InMemoryDelayQueue {
    async fn receive(&self, visibility: Duration) -> Result<Option<Delivery>, QueueError> {
        let now = Instant::now();
        let mut state = self.lock()?;

        // Expired in-flight deliveries become visible again.
        let mut index = 0;
        while index < state.in_flight.len() {
            if state.in_flight[index].redeliver_at <= now {
                let expired = state.in_flight.swap_remove(index);
                state.pending.push(QueuedTrigger {
                    id: expired.id,
                    trigger: expired.trigger,
                    visible_at: now,
                    attempts: expired.attempts,
                });
            } else {
                index += 1;
            }
        }

        // Claim the earliest due trigger, if any.
        let due = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, q)| q.visible_at <= now)
            .min_by_key(|(_, q)| q.visible_at)
            .map(|(i, _)| i);
        let Some(index) = due else {
            return Ok(None);
        };

        let claimed = state.pending.swap_remove(index);
        let attempt = claimed.attempts + 1;
        let delivery = Delivery {
            trigger: claimed.trigger.clone(),
            delivery_id: claimed.id.clone(),
            attempt,
        };
        state.in_flight.push(InFlightTrigger {
            id: claimed.id,
            trigger: claimed.trigger,
            redeliver_at: now + visibility,
            attempts: attempt,
        });

        Ok(Some(delivery))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state.in_flight.retain(|m| m.id != delivery.delivery_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::PlanId;
    use tokio::time::sleep;

    fn trigger() -> PlanTrigger {
        PlanTrigger::new(PlanId::new(), "agent-1", "user-1")
    }

    const VISIBILITY: Duration = Duration::from_millis(40);

    #[test]
    fn test_zero_delay_trigger_is_immediately_visible_once() {
        tokio_test::block_on(async {
            let queue = InMemoryDelayQueue::new();
            queue.schedule(trigger(), Duration::ZERO).await.unwrap();

            let delivery = queue.receive(VISIBILITY).await.unwrap().expect("delivery");
            assert_eq!(delivery.attempt, 1);

            // In flight: invisible to a second consumer.
            assert!(queue.receive(VISIBILITY).await.unwrap().is_none());

            queue.acknowledge(&delivery).await.unwrap();
            assert!(queue.receive(VISIBILITY).await.unwrap().is_none());
        });
    }

    #[test]
    fn test_delayed_trigger_not_visible_before_its_delay() {
        tokio_test::block_on(async {
            let queue = InMemoryDelayQueue::new();
            let handle = queue
                .schedule(trigger(), Duration::from_millis(50))
                .await
                .unwrap();
            assert!(handle.delivery_time > Utc::now());

            assert!(queue.receive(VISIBILITY).await.unwrap().is_none());

            sleep(Duration::from_millis(60)).await;
            assert!(queue.receive(VISIBILITY).await.unwrap().is_some());
        });
    }

    #[test]
    fn test_unacknowledged_delivery_redelivers_with_higher_attempt() {
        tokio_test::block_on(async {
            let queue = InMemoryDelayQueue::new();
            queue.schedule(trigger(), Duration::ZERO).await.unwrap();

            let first = queue
                .receive(Duration::from_millis(30))
                .await
                .unwrap()
                .expect("first delivery");
            assert_eq!(first.attempt, 1);

            sleep(Duration::from_millis(40)).await;
            let second = queue
                .receive(VISIBILITY)
                .await
                .unwrap()
                .expect("redelivery");
            assert_eq!(second.delivery_id, first.delivery_id);
            assert_eq!(second.attempt, 2);
        });
    }

    #[test]
    fn test_earliest_due_trigger_is_claimed_first() {
        tokio_test::block_on(async {
            let queue = InMemoryDelayQueue::new();
            let early = trigger();
            let late = trigger();
            queue
                .schedule(late.clone(), Duration::from_millis(10))
                .await
                .unwrap();
            queue.schedule(early.clone(), Duration::ZERO).await.unwrap();

            sleep(Duration::from_millis(20)).await;
            let first = queue.receive(VISIBILITY).await.unwrap().expect("delivery");
            assert_eq!(first.trigger, early);
        });
    }
}
