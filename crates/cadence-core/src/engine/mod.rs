//! Engine module
//!
//! The trigger-driven plan advancement state machine. On every delivered
//! trigger the engine:
//! - loads the plan and re-validates its state (this re-validation is also
//!   the cancellation mechanism: stale triggers become no-ops)
//! - executes the first pending step through the external executor
//! - commits the outcome (history entry, then conditional completion patch)
//! - re-arms the scheduler for the next step's delay, or quiesces
//!
//! Nothing stays resident between steps; all engine state lives in the store
//! and the queue.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::executor::{ExecutorError, StepExecutor, StepInvocation};
use crate::queue::{DelayScheduler, DeliveryHandle, QueueError};
use crate::store::{PlanStore, StoreError};
use crate::types::PlanTrigger;

/// Engine errors: the trigger-processing attempt failed and the transport's
/// redelivery is the retry mechanism
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// What handling a trigger did. Everything here is a success from the
/// transport's point of view: the delivery should be acknowledged.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// One step executed and committed
    Advanced {
        /// Position of the step that completed
        position: u32,
        /// Whether that was the final step
        plan_done: bool,
        /// Receipt for the next step's trigger, when one was armed
        rearmed: Option<DeliveryHandle>,
    },
    /// The plan does not exist; the trigger is discarded
    PlanMissing,
    /// Every step was already completed; duplicate or late delivery
    AlreadyDone,
    /// A concurrent duplicate committed this step first; the winner re-arms
    Superseded { position: u32 },
}

/// The plan execution engine.
///
/// Capabilities are constructor-supplied; the engine owns no backend choice
/// and no ambient registry.
pub struct PlanEngine {
    store: Arc<dyn PlanStore>,
    scheduler: Arc<dyn DelayScheduler>,
    executor: Arc<dyn StepExecutor>,
}

impl PlanEngine {
    /// Create an engine over the given capabilities
    pub fn new(
        store: Arc<dyn PlanStore>,
        scheduler: Arc<dyn DelayScheduler>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            store,
            scheduler,
            executor,
        }
    }

    /// Advance the plan a trigger points at by exactly one step.
    ///
    /// Benign conditions (missing plan, already-done plan, lost duplicate
    /// race) return an outcome, not an error; only store/executor/queue
    /// failures propagate, and those commit nothing for the current step.
    pub async fn handle_trigger(
        &self,
        trigger: &PlanTrigger,
    ) -> Result<TriggerOutcome, EngineError> {
        let Some(mut plan) = self.store.get(&trigger.plan_id, &trigger.owner).await? else {
            tracing::warn!(
                plan_id = %trigger.plan_id,
                owner = %trigger.owner,
                "trigger for unknown plan discarded"
            );
            return Ok(TriggerOutcome::PlanMissing);
        };

        let Some(step) = plan.first_pending() else {
            tracing::info!(
                plan_id = %trigger.plan_id,
                owner = %trigger.owner,
                "trigger for completed plan discarded"
            );
            return Ok(TriggerOutcome::AlreadyDone);
        };
        let position = step.position;
        let description = step.description.clone();

        tracing::info!(
            plan_id = %trigger.plan_id,
            owner = %trigger.owner,
            position = position,
            "executing plan step"
        );

        let outcome = self
            .executor
            .execute(StepInvocation {
                description,
                history: plan.history.clone(),
                subject: trigger.subject.clone(),
                owner: trigger.owner.clone(),
            })
            .await?;

        // Commit order: history first, then the completion flag. The append
        // is unconditional; the completion patch is the commit point.
        let appended = self
            .store
            .append_history(&trigger.plan_id, &trigger.owner, outcome)
            .await?;
        if !appended {
            tracing::warn!(
                plan_id = %trigger.plan_id,
                owner = %trigger.owner,
                "plan vanished before history append; discarding trigger"
            );
            return Ok(TriggerOutcome::PlanMissing);
        }

        let completed_at = Utc::now();
        let committed = self
            .store
            .patch_step_completed(&trigger.plan_id, &trigger.owner, position, completed_at)
            .await?;
        if !committed {
            tracing::warn!(
                plan_id = %trigger.plan_id,
                owner = %trigger.owner,
                position = position,
                "step already completed by a concurrent trigger; skipping re-arm"
            );
            return Ok(TriggerOutcome::Superseded { position });
        }

        // Mirror the committed patch locally to pick the next step.
        plan.complete_step(position, completed_at);

        match plan.first_pending() {
            Some(next) => {
                let handle = self
                    .scheduler
                    .schedule(trigger.clone(), next.delay)
                    .await?;
                tracing::info!(
                    plan_id = %trigger.plan_id,
                    owner = %trigger.owner,
                    next_position = next.position,
                    delivery_time = %handle.delivery_time,
                    "armed trigger for next step"
                );
                Ok(TriggerOutcome::Advanced {
                    position,
                    plan_done: false,
                    rearmed: Some(handle),
                })
            }
            None => {
                tracing::info!(
                    plan_id = %trigger.plan_id,
                    owner = %trigger.owner,
                    "plan completed; no further trigger armed"
                );
                Ok(TriggerOutcome::Advanced {
                    position,
                    plan_done: true,
                    rearmed: None,
                })
            }
        }
    }
}
