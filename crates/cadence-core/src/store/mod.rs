//! Store module
//!
//! Storage contract for the Plan aggregate:
//! - create / point read
//! - typed partial patches (set one completion flag, append one history entry)
//!
//! There are no whole-document rewrites after creation and no read-modify-write
//! on the caller side; all mutation goes through `PlanPatch`. Absence is a
//! normal outcome (`Ok(None)` / `Ok(false)`), always distinguishable from
//! transport failure.
//!
//! Note: Implementations are in the cadence-stores crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OwnerKey, Plan, PlanId};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Plan already exists: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Typed partial-update descriptor applied to a stored plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanPatch {
    /// Set the completion flag of exactly one step.
    ///
    /// Conditional: applies only while the step is pending and its
    /// predecessor has completed, so at most one of two racing writers
    /// commits it.
    CompleteStep {
        position: u32,
        completed_at: DateTime<Utc>,
    },
    /// Append one entry to the history sequence.
    AppendHistory { entry: String },
}

/// PlanStore trait - async interface for plan persistence
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Store a new plan; `Conflict` if the identifier already exists
    async fn create(&self, plan: &Plan) -> Result<(), StoreError>;

    /// Point lookup; `None` is a valid, expected outcome, not an error
    async fn get(&self, plan_id: &PlanId, owner: &OwnerKey) -> Result<Option<Plan>, StoreError>;

    /// Apply one partial patch; `false` means there was nothing to patch
    /// (plan missing, position missing, or the conditional not satisfied)
    async fn patch(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        patch: PlanPatch,
    ) -> Result<bool, StoreError>;

    /// Mark one step completed
    async fn patch_step_completed(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        position: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.patch(
            plan_id,
            owner,
            PlanPatch::CompleteStep {
                position,
                completed_at,
            },
        )
        .await
    }

    /// Append one history entry
    async fn append_history(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        entry: String,
    ) -> Result<bool, StoreError> {
        self.patch(plan_id, owner, PlanPatch::AppendHistory { entry })
            .await
    }
}
