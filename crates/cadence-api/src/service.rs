//! The plan operations consumed by the agent runtime.

use std::sync::Arc;
use std::time::Duration;

use cadence_core::queue::{DelayScheduler, DeliveryHandle};
use cadence_core::store::PlanStore;
use cadence_core::types::{OwnerKey, Plan, PlanId, StepSpec, SubjectKey};

use crate::ApiError;

/// Caller-facing plan surface: creation, queries, and out-of-band advancement.
///
/// Everything here is scoped by the owner key; a plan is only visible to the
/// owner it was created under.
pub struct PlanApi {
    store: Arc<dyn PlanStore>,
    scheduler: Arc<dyn DelayScheduler>,
}

impl PlanApi {
    /// Create the API surface over the given capabilities
    pub fn new(store: Arc<dyn PlanStore>, scheduler: Arc<dyn DelayScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Persist a new plan and immediately arm the first step's trigger.
    ///
    /// Rejects empty step lists, blank names, and blank step descriptions
    /// synchronously; nothing is persisted on rejection.
    pub async fn create_plan(
        &self,
        name: impl Into<String>,
        subject: impl Into<SubjectKey>,
        owner: impl Into<OwnerKey>,
        steps: Vec<StepSpec>,
    ) -> Result<Plan, ApiError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ApiError::InvalidArgument(
                "name must not be empty".to_string(),
            ));
        }
        if steps.is_empty() {
            return Err(ApiError::InvalidArgument(
                "a plan needs at least one step".to_string(),
            ));
        }
        if let Some(index) = steps.iter().position(|s| s.description.trim().is_empty()) {
            return Err(ApiError::InvalidArgument(format!(
                "step {} has an empty description",
                index + 1
            )));
        }

        let first_delay = steps[0].delay;
        let plan = Plan::new(name, subject, owner, steps);

        tracing::info!(
            plan_id = %plan.id,
            owner = %plan.owner,
            subject = %plan.subject,
            name = %plan.name,
            steps = plan.steps.len(),
            "creating plan"
        );

        self.store.create(&plan).await?;
        let handle = self.scheduler.schedule(plan.trigger(), first_delay).await?;
        tracing::info!(
            plan_id = %plan.id,
            delivery_time = %handle.delivery_time,
            "armed trigger for first step"
        );

        Ok(plan)
    }

    /// Point lookup; `None` when the plan does not exist
    pub async fn get_plan(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
    ) -> Result<Option<Plan>, ApiError> {
        Ok(self.store.get(plan_id, owner).await?)
    }

    /// Whether any step is still pending.
    ///
    /// `false` both for a fully completed plan and for a plan that does not
    /// exist; callers must not infer existence from this result.
    pub async fn has_incomplete_steps(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
    ) -> Result<bool, ApiError> {
        match self.store.get(plan_id, owner).await? {
            Some(plan) => Ok(plan.has_incomplete_steps()),
            None => {
                tracing::warn!(
                    plan_id = %plan_id,
                    owner = %owner,
                    "plan not found; treating as no incomplete steps"
                );
                Ok(false)
            }
        }
    }

    /// Mark one step completed out of band, bypassing the executor.
    ///
    /// Same idempotency rules as the engine commit: `false` when there is
    /// nothing to do (missing plan or step, already completed, predecessor
    /// still pending).
    pub async fn complete_step(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        position: u32,
    ) -> Result<bool, ApiError> {
        let applied = self
            .store
            .patch_step_completed(plan_id, owner, position, chrono::Utc::now())
            .await?;
        if !applied {
            tracing::warn!(
                plan_id = %plan_id,
                owner = %owner,
                position = position,
                "step completion was a no-op"
            );
        }
        Ok(applied)
    }

    /// Append one entry to the plan history; `false` when the plan is missing
    pub async fn append_history_entry(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        entry: impl Into<String>,
    ) -> Result<bool, ApiError> {
        Ok(self.store.append_history(plan_id, owner, entry.into()).await?)
    }

    /// The outcome history so far; empty when the plan does not exist
    pub async fn get_history(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
    ) -> Result<Vec<String>, ApiError> {
        Ok(self
            .store
            .get(plan_id, owner)
            .await?
            .map(|plan| plan.history)
            .unwrap_or_default())
    }

    /// Arm a trigger for the plan manually after the given delay.
    ///
    /// Skipped (returning `None`) when the plan does not exist or every step
    /// has already completed, so stray calls cannot wake a finished plan.
    pub async fn schedule_next_step(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        subject: &SubjectKey,
        delay: Duration,
    ) -> Result<Option<DeliveryHandle>, ApiError> {
        let Some(plan) = self.store.get(plan_id, owner).await? else {
            tracing::warn!(plan_id = %plan_id, owner = %owner, "plan not found; skipping schedule");
            return Ok(None);
        };
        if plan.is_done() {
            tracing::warn!(plan_id = %plan_id, owner = %owner, "plan has all steps completed; skipping schedule");
            return Ok(None);
        }

        let trigger =
            cadence_core::types::PlanTrigger::new(*plan_id, owner.clone(), subject.clone());
        let handle = self.scheduler.schedule(trigger, delay).await?;
        Ok(Some(handle))
    }
}
