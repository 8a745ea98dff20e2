//! # Cadence API
//!
//! The plan operations exposed to the agent runtime: create a plan (arming
//! its first trigger), query it, and advance or annotate it out of band.

mod error;
mod service;

pub use error::{ApiError, ErrorCode};
pub use service::PlanApi;
