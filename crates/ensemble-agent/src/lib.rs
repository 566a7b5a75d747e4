//! Model access and the agent execution unit.
//!
//! This crate owns the two lowest layers of a run: talking to a model
//! provider (buffered and streamed completions over an [`LlmBackend`]) and
//! wrapping one [`AgentPersona`](ensemble_core::AgentPersona) into an
//! [`AgentUnit`] that builds message lists and toolsets, performs exactly
//! one completion per invocation, and scores its own suitability for a
//! free-text task.
//!
//! # Main types
//!
//! - [`ModelConfig`] / [`LlmProvider`] — Provider selection and credentials.
//! - [`LlmClient`] — Dispatches to the configured provider backend.
//! - [`AgentUnit`] — Runtime wrapper performing one agent's work per invocation.

/// Provider backends.
pub mod backends;
/// Provider configuration and model resolution.
pub mod config;
/// LLM client dispatcher and completion types.
pub mod llm;
/// Backend stream events.
pub mod stream;
/// The agent execution unit.
pub mod unit;

pub use backends::{CallOptions, LlmBackend};
pub use config::{LlmProvider, ModelConfig};
pub use llm::{Completion, LlmClient};
pub use stream::StreamEvent;
pub use unit::{AgentUnit, Suitability, UnitOutput};
