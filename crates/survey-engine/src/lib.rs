//! Survey session engine for conversational agents.
//!
//! The `surveys` module carries the whole core: survey definitions with
//! conditional branching, per-type response validation, session progress and
//! completion tracking, and the orchestrator that sequences them over a
//! storage port.

pub mod config;
pub mod error;
pub mod surveys;
pub mod telemetry;
