//! PlanStore in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use cadence_core::store::{PlanPatch, PlanStore, StoreError};
use cadence_core::types::{OwnerKey, Plan, PlanId};

/// In-memory implementation for development and testing.
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<(OwnerKey, PlanId), Plan>>,
}

impl InMemoryPlanStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create(&self, plan: &Plan) -> Result<(), StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let key = (plan.owner.clone(), plan.id);
        if plans.contains_key(&key) {
            return Err(StoreError::Conflict(plan.id.to_string()));
        }
        plans.insert(key, plan.clone());
        Ok(())
    }

    async fn get(&self, plan_id: &PlanId, owner: &OwnerKey) -> Result<Option<Plan>, StoreError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(plans.get(&(owner.clone(), *plan_id)).cloned())
    }

    async fn patch(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        patch: PlanPatch,
    ) -> Result<bool, StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(plan) = plans.get_mut(&(owner.clone(), *plan_id)) else {
            return Ok(false);
        };
        match patch {
            PlanPatch::CompleteStep {
                position,
                completed_at,
            } => Ok(plan.complete_step(position, completed_at)),
            PlanPatch::AppendHistory { entry } => {
                plan.append_history(entry);
                Ok(true)
            }
        }
    }
}
