//! Plan type definitions
//!
//! Plan is the aggregate root: an ordered sequence of delayed steps plus an
//! append-only history of step outcomes. A plan is created once, fully, and
//! afterwards mutates only by marking a single step completed or appending
//! one history entry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::step::{Step, StepSpec};
use super::trigger::PlanTrigger;

/// Strongly-typed plan identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its canonical string form
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PlanId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ownership key scoping all storage and queue operations for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct OwnerKey(pub String);

impl OwnerKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OwnerKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The identity the plan runs on behalf of; carried through to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SubjectKey(pub String);

impl SubjectKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plan - the durable aggregate of ordered, delayed steps plus history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier, assigned at creation
    pub id: PlanId,
    /// Short human-readable label
    pub name: String,
    /// Ownership/partitioning key
    pub owner: OwnerKey,
    /// Identity the plan runs on behalf of
    pub subject: SubjectKey,
    /// Ordered steps, 1-based positions, contiguous
    pub steps: Vec<Step>,
    /// Append-only outcome log, one entry per executed step
    #[serde(default)]
    pub history: Vec<String>,
    /// Creation timestamp
    pub created: DateTime<Utc>,
    /// Index of the first pending step; completed steps form a prefix, so
    /// this makes next-step selection O(1) instead of a scan.
    #[serde(default)]
    pub cursor: usize,
}

impl Plan {
    /// Create a new plan with positions assigned from the step order
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<SubjectKey>,
        owner: impl Into<OwnerKey>,
        specs: Vec<StepSpec>,
    ) -> Self {
        let steps = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Step::new(index as u32 + 1, spec))
            .collect();

        Self {
            id: PlanId::new(),
            name: name.into(),
            owner: owner.into(),
            subject: subject.into(),
            steps,
            history: Vec::new(),
            created: Utc::now(),
            cursor: 0,
        }
    }

    /// The only step eligible to execute: the lowest-position pending step
    pub fn first_pending(&self) -> Option<&Step> {
        self.steps.iter().skip(self.cursor).find(|s| s.is_pending())
    }

    /// Look up a step by its 1-based position
    pub fn step(&self, position: u32) -> Option<&Step> {
        if position == 0 {
            return None;
        }
        self.steps.get(position as usize - 1)
    }

    /// Whether any step is still pending
    pub fn has_incomplete_steps(&self) -> bool {
        self.first_pending().is_some()
    }

    /// Whether every step has completed (terminal state)
    pub fn is_done(&self) -> bool {
        !self.has_incomplete_steps()
    }

    /// Mark the step at `position` completed.
    ///
    /// The transition only applies while the step is pending and its
    /// predecessor has completed; any other state returns `false` and leaves
    /// the plan untouched. Of two racing writers, at most one sees `true`.
    pub fn complete_step(&mut self, position: u32, completed_at: DateTime<Utc>) -> bool {
        if position == 0 {
            return false;
        }
        let index = position as usize - 1;
        if index > 0 {
            match self.steps.get(index - 1) {
                Some(prev) if prev.completed => {}
                _ => return false,
            }
        }
        match self.steps.get_mut(index) {
            Some(step) if step.is_pending() => {
                step.completed = true;
                step.completed_at = Some(completed_at);
                self.cursor = position as usize;
                true
            }
            _ => false,
        }
    }

    /// Append one entry to the outcome history
    pub fn append_history(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    /// The queue payload used to advance this plan
    pub fn trigger(&self) -> PlanTrigger {
        PlanTrigger {
            plan_id: self.id,
            owner: self.owner.clone(),
            subject: self.subject.clone(),
        }
    }
}
