//! Core types and error definitions for the Ensemble orchestration core.
//!
//! This crate provides the foundational types shared across all Ensemble
//! crates: error handling, chat message representations, tool invocation
//! types, agent persona configuration, per-run bookkeeping records, and the
//! progress events emitted by streaming runs.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`AgentPersona`] — Static configuration for one agent (role, prompt, tool access).
//! - [`ChatMessage`] — A single message in a model conversation.
//! - [`TranscriptEntry`] / [`AgentResult`] — Per-invocation bookkeeping records.
//! - [`ProgressEvent`] — The streaming counterpart of a buffered run result.

/// Error types shared across the workspace.
pub mod error;
/// Streaming progress events.
pub mod event;
/// Chat message and role types.
pub mod message;
/// Agent persona configuration.
pub mod persona;
/// Transcript entries and per-invocation results.
pub mod record;
/// Tool invocation request/response types.
pub mod tool;

pub use error::{EnsembleError, EnsembleResult};
pub use event::ProgressEvent;
pub use message::{ChatMessage, Role};
pub use persona::AgentPersona;
pub use record::{AgentResult, TranscriptEntry};
pub use tool::{ToolInvocation, ToolOutput};
