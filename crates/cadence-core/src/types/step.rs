//! Step type definitions
//!
//! Step is one unit of deferred work within a Plan, identified by its
//! 1-based position. Content and order are fixed at plan creation; only the
//! completion status mutates, and only from pending to completed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-facing step input: what to do, and how long to wait before doing it.
///
/// The delay is measured from the previous step's completion (or from plan
/// creation for the first step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// The unit of work for the step executor to perform
    pub description: String,
    /// Non-negative wait before the step becomes eligible to run
    pub delay: Duration,
}

impl StepSpec {
    /// Create a new step spec
    pub fn new(description: impl Into<String>, delay: Duration) -> Self {
        Self {
            description: description.into(),
            delay,
        }
    }
}

/// A single step embedded in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// 1-based ordinal, unique within the plan, fixed at creation
    pub position: u32,
    /// The unit of work for the step executor to perform
    pub description: String,
    /// Wait measured from the prior step's completion before this step runs
    pub delay: Duration,
    /// Completion flag; transitions false -> true and never reverts
    #[serde(default)]
    pub completed: bool,
    /// Instant the completion patch landed
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Create a pending step at the given position
    pub fn new(position: u32, spec: StepSpec) -> Self {
        Self {
            position,
            description: spec.description,
            delay: spec.delay,
            completed: false,
            completed_at: None,
        }
    }

    /// Whether this step is still waiting to be executed
    pub fn is_pending(&self) -> bool {
        !self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_step_starts_pending() {
        let step = Step::new(1, StepSpec::new("send welcome", Duration::ZERO));
        assert_eq!(step.position, 1);
        assert!(step.is_pending());
        assert!(step.completed_at.is_none());
    }
}
