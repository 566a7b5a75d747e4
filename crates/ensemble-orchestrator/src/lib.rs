//! The composition layer of the Ensemble orchestration core.
//!
//! A roster of agent personas is materialized into execution units once per
//! instance, then composed three ways: a [`AgentRouter`] picks exactly one
//! unit per message, a [`TeamOrchestrator`] runs the roster under one of
//! five strategies (sequential, round-robin, debate, chain, supervisor),
//! and a [`SwarmOrchestrator`] dispatches every unit concurrently and
//! aggregates the survivors (concatenate, vote, synthesize, best, merge).
//! Each exposes a buffered `run` and a streaming `run_stream` with
//! identical data flow.
//!
//! # Main types
//!
//! - [`AgentRouter`] — Keyword or model classification, then delegation.
//! - [`TeamOrchestrator`] / [`TeamStrategy`] — Five composition strategies.
//! - [`SwarmOrchestrator`] / [`Aggregation`] — Concurrent fan-out with
//!   timeouts and aggregation.
//! - [`materialize_units`] — Roster-to-units materialization shared by all
//!   three.

/// JSON extraction helpers for untrusted model replies.
mod json;
/// Roster materialization and bookkeeping helpers.
pub mod roster;
/// The message router.
pub mod router;
/// Shared synthesis rule.
mod synthesis;
/// The swarm orchestrator.
pub mod swarm;
/// The team orchestrator.
pub mod team;
/// Definitions, run configs, and results.
pub mod types;

pub use roster::{materialize_units, record_unit_output};
pub use router::AgentRouter;
pub use swarm::SwarmOrchestrator;
pub use team::TeamOrchestrator;
pub use types::{
    Aggregation, RouteResult, RouterDefinition, SwarmDefinition, SwarmRunConfig, SwarmRunResult,
    TeamDefinition, TeamRunConfig, TeamRunResult, TeamStrategy,
};
