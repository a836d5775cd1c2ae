//! Core engine: per-session state machine, orchestration and bet dispatch.

pub mod dispatcher;
pub mod events;
pub mod orchestrator;
pub mod session;
