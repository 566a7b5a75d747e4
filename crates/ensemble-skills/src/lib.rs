//! Skill and integration registries for the Ensemble orchestration core.
//!
//! Skills are the tools an agent may advertise to the model; integrations
//! are per-user external services (calendar, mail, chat platforms, ...)
//! exposing their own skills. Both are opaque collaborators from the
//! orchestration layer's point of view: execution units only read
//! descriptors from them and, for the built-in handoff skill, invoke
//! `execute`.
//!
//! # Main types
//!
//! - [`Skill`] / [`SkillDescriptor`] — The tool interface and its metadata.
//! - [`SkillRegistry`] — Global registry of available skills.
//! - [`Integration`] / [`IntegrationRegistry`] — Per-user external services.
//! - [`HandoffSkill`] — Built-in delegation-signal tool, always present.

/// Built-in handoff skill.
pub mod handoff;
/// Integration trait and per-user registry.
pub mod integration;
/// Skill registry.
pub mod registry;
/// Skill trait and descriptor.
pub mod skill;

pub use handoff::{HandoffRequest, HandoffSkill, HANDOFF_SKILL_ID};
pub use integration::{Integration, IntegrationDefinition, IntegrationRegistry};
pub use registry::SkillRegistry;
pub use skill::{Skill, SkillContext, SkillDescriptor};
