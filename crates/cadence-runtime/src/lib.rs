//! # Cadence Runtime
//!
//! The consumer process pieces: the worker loop that drains the trigger
//! queue into the engine, and the bootstrap that wires store, queue,
//! executor, and API together from a single config by explicit construction.

mod bootstrap;
mod worker;

pub use bootstrap::{BootstrapError, PlanApp};
pub use worker::{TriggerWorker, WorkerConfig};
