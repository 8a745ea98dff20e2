//! Executor module
//!
//! The external capability that performs the work a step describes. In the
//! surrounding agent runtime this is one more reasoning turn of the agent;
//! here it is a seam: latency and failure modes are opaque, and the engine
//! commits nothing when it fails.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{OwnerKey, SubjectKey};

/// Executor error types
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Executor failure: {0}")]
    Failed(String),

    #[error("Executor timed out after {0:?}")]
    Timeout(Duration),
}

/// Everything a step executor gets to work with
#[derive(Debug, Clone)]
pub struct StepInvocation {
    /// The unit of work to perform
    pub description: String,
    /// Outcome history of the plan so far, for continuity context
    pub history: Vec<String>,
    /// Identity the plan runs on behalf of
    pub subject: SubjectKey,
    /// Ownership key the plan is scoped by
    pub owner: OwnerKey,
}

/// StepExecutor trait - async interface to the external work capability
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Perform the described work, returning its free-text outcome
    async fn execute(&self, invocation: StepInvocation) -> Result<String, ExecutorError>;
}
