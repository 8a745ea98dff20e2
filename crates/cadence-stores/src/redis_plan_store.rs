//! PlanStore Redis implementation.
//!
//! Layout per plan, keyed under the owner partition:
//! - `{prefix}:{owner}:plan:{id}` - hash with the immutable document under
//!   the `plan` field, one `step:{position}` field per completed step, and a
//!   `cursor` field for O(1) first-pending lookup
//! - `{prefix}:{owner}:plan:{id}:history` - list of outcome entries
//!
//! Mutations are field-level: RPUSH appends one history entry atomically and
//! HSETNX commits a step completion at most once, which is what makes the
//! completion patch safe under duplicate trigger processing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

use cadence_core::store::{PlanPatch, PlanStore, StoreError};
use cadence_core::types::{OwnerKey, Plan, PlanId};

const PLAN_FIELD: &str = "plan";
const CURSOR_FIELD: &str = "cursor";

/// Redis implementation for durable plan persistence.
pub struct RedisPlanStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPlanStore {
    /// Create a new Redis plan store from a connection URL.
    pub fn new(connection_url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn plan_key(&self, owner: &OwnerKey, plan_id: &PlanId) -> String {
        format!("{}:{}:plan:{}", self.key_prefix, owner, plan_id)
    }

    fn history_key(&self, owner: &OwnerKey, plan_id: &PlanId) -> String {
        format!("{}:history", self.plan_key(owner, plan_id))
    }

    fn step_field(position: u32) -> String {
        format!("step:{}", position)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn load_base_plan(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        key: &str,
    ) -> Result<Option<Plan>, StoreError> {
        let payload: Option<String> = conn
            .hget(key, PLAN_FIELD)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        match payload {
            Some(payload) => {
                let plan: Plan = serde_json::from_str(&payload)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    async fn apply_complete_step(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        position: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let key = self.plan_key(owner, plan_id);

        let Some(plan) = self.load_base_plan(&mut conn, &key).await? else {
            return Ok(false);
        };
        if plan.step(position).is_none() {
            return Ok(false);
        }

        if position > 1 {
            let predecessor_done: bool = conn
                .hexists(&key, Self::step_field(position - 1))
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            if !predecessor_done {
                return Ok(false);
            }
        }

        // HSETNX is the commit point: of two racing writers, one sees false.
        let committed: bool = conn
            .hset_nx(&key, Self::step_field(position), completed_at.to_rfc3339())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if !committed {
            return Ok(false);
        }

        // Cursor writes are monotone under the completed-prefix invariant.
        conn.hset::<_, _, _, ()>(&key, CURSOR_FIELD, position as usize)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(true)
    }

    async fn apply_append_history(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        entry: String,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let key = self.plan_key(owner, plan_id);

        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if !exists {
            return Ok(false);
        }

        conn.rpush::<_, _, ()>(self.history_key(owner, plan_id), entry)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(true)
    }
}

#[async_trait]
impl PlanStore for RedisPlanStore {
    async fn create(&self, plan: &Plan) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let key = self.plan_key(&plan.owner, &plan.id);

        // The stored base document carries the immutable parts; completion
        // marks and history live in their own fields and keys.
        let mut base = plan.clone();
        base.history.clear();
        let payload = serde_json::to_string(&base)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let created: bool = conn
            .hset_nx(&key, PLAN_FIELD, payload)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if !created {
            return Err(StoreError::Conflict(plan.id.to_string()));
        }

        for entry in &plan.history {
            conn.rpush::<_, _, ()>(self.history_key(&plan.owner, &plan.id), entry)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    async fn get(&self, plan_id: &PlanId, owner: &OwnerKey) -> Result<Option<Plan>, StoreError> {
        let mut conn = self.connection().await?;
        let key = self.plan_key(owner, plan_id);

        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let Some(payload) = fields.get(PLAN_FIELD) else {
            return Ok(None);
        };
        let mut plan: Plan = serde_json::from_str(payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        for step in &mut plan.steps {
            if let Some(completed_at) = fields.get(&Self::step_field(step.position)) {
                let parsed = DateTime::parse_from_rfc3339(completed_at)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                step.completed = true;
                step.completed_at = Some(parsed.with_timezone(&Utc));
            }
        }
        if let Some(cursor) = fields.get(CURSOR_FIELD) {
            plan.cursor = cursor
                .parse()
                .map_err(|e: std::num::ParseIntError| StoreError::Serialization(e.to_string()))?;
        }

        plan.history = conn
            .lrange(self.history_key(owner, plan_id), 0, -1)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Some(plan))
    }

    async fn patch(
        &self,
        plan_id: &PlanId,
        owner: &OwnerKey,
        patch: PlanPatch,
    ) -> Result<bool, StoreError> {
        match patch {
            PlanPatch::CompleteStep {
                position,
                completed_at,
            } => {
                self.apply_complete_step(plan_id, owner, position, completed_at)
                    .await
            }
            PlanPatch::AppendHistory { entry } => {
                self.apply_append_history(plan_id, owner, entry).await
            }
        }
    }
}
