//! Trigger payload definition
//!
//! A trigger is the small queue message instructing the engine to attempt to
//! advance a specific plan. It carries no step position: the engine always
//! re-reads the plan and selects the first pending step, which is what makes
//! duplicate and late deliveries safe to re-validate.

use serde::{Deserialize, Serialize};

use super::plan::{OwnerKey, PlanId, SubjectKey};

/// Queue payload identifying the plan to advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTrigger {
    /// Plan to advance
    pub plan_id: PlanId,
    /// Ownership key the plan is scoped by
    pub owner: OwnerKey,
    /// Identity the plan runs on behalf of
    pub subject: SubjectKey,
}

impl PlanTrigger {
    /// Create a trigger for the given scoping triple
    pub fn new(
        plan_id: PlanId,
        owner: impl Into<OwnerKey>,
        subject: impl Into<SubjectKey>,
    ) -> Self {
        Self {
            plan_id,
            owner: owner.into(),
            subject: subject.into(),
        }
    }
}
