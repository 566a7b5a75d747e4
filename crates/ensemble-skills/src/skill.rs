use async_trait::async_trait;
use ensemble_core::{EnsembleResult, ToolInvocation, ToolOutput};
use serde::{Deserialize, Serialize};

/// Metadata describing a skill's interface.
///
/// The `id` doubles as the tool name advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Stable identifier, unique within its registry.
    pub id: String,
    /// What the skill does, shown to the model.
    pub description: String,
    /// JSON schema of the skill's arguments.
    pub parameters_schema: serde_json::Value,
}

/// Per-invocation context passed to skill execution.
#[derive(Debug, Clone)]
pub struct SkillContext {
    /// The user on whose behalf the skill runs.
    pub user_id: String,
    /// The conversation the invocation belongs to.
    pub conversation_id: String,
}

/// Trait that all skills implement, built-in or host-provided.
#[async_trait]
pub trait Skill: Send + Sync {
    /// The skill's interface metadata.
    fn descriptor(&self) -> &SkillDescriptor;

    /// Executes one invocation of this skill.
    async fn execute(
        &self,
        invocation: ToolInvocation,
        ctx: &SkillContext,
    ) -> EnsembleResult<ToolOutput>;
}
