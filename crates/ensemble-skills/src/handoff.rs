use crate::skill::{Skill, SkillContext, SkillDescriptor};
use async_trait::async_trait;
use ensemble_core::{EnsembleResult, ToolInvocation, ToolOutput};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Id of the built-in handoff skill, present in every unit's toolset.
pub const HANDOFF_SKILL_ID: &str = "handoff";

/// A delegation signal produced by the handoff skill.
///
/// Invoking the skill does not change control flow by itself; the payload is
/// returned to the caller, which decides whether and how to act on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandoffRequest {
    /// Id of the agent the caller should delegate to.
    #[serde(default)]
    pub target_agent: String,
    /// Why the current agent wants to delegate.
    #[serde(default)]
    pub reason: String,
    /// Context to carry over to the target agent.
    #[serde(default)]
    pub context: String,
}

/// Built-in skill an agent calls to signal it wants to delegate the task.
pub struct HandoffSkill {
    descriptor: SkillDescriptor,
}

impl HandoffSkill {
    /// Creates the handoff skill with its fixed descriptor.
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor {
                id: HANDOFF_SKILL_ID.to_string(),
                description: "Signal that another agent is better suited for this task. \
                              The orchestrating caller decides whether to act on the signal."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "target_agent": {
                            "type": "string",
                            "description": "Id of the agent to delegate to"
                        },
                        "reason": {
                            "type": "string",
                            "description": "Why this agent should take over"
                        },
                        "context": {
                            "type": "string",
                            "description": "Context to pass along to the target agent"
                        }
                    },
                    "required": ["target_agent"]
                }),
            },
        }
    }
}

impl Default for HandoffSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for HandoffSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        invocation: ToolInvocation,
        _ctx: &SkillContext,
    ) -> EnsembleResult<ToolOutput> {
        // Missing fields degrade to empty strings; the caller validates the
        // target against its own roster.
        let request: HandoffRequest =
            serde_json::from_value(invocation.arguments).unwrap_or(HandoffRequest {
                target_agent: String::new(),
                reason: String::new(),
                context: String::new(),
            });
        info!(target = %request.target_agent, "Handoff requested");
        Ok(ToolOutput::success(
            invocation.id,
            serde_json::to_value(&request)?,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ctx() -> SkillContext {
        SkillContext {
            user_id: "u1".to_string(),
            conversation_id: "c1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_handoff_returns_structured_payload() {
        let skill = HandoffSkill::new();
        let out = skill
            .execute(
                ToolInvocation {
                    id: "call_1".to_string(),
                    skill_id: HANDOFF_SKILL_ID.to_string(),
                    arguments: serde_json::json!({
                        "target_agent": "researcher",
                        "reason": "needs research",
                        "context": "user asked about citations"
                    }),
                },
                &ctx(),
            )
            .await
            .unwrap();

        assert!(!out.is_error);
        let request: HandoffRequest = serde_json::from_value(out.payload).unwrap();
        assert_eq!(request.target_agent, "researcher");
        assert_eq!(request.reason, "needs research");
    }

    #[tokio::test]
    async fn test_handoff_tolerates_partial_arguments() {
        let skill = HandoffSkill::new();
        let out = skill
            .execute(
                ToolInvocation {
                    id: "call_2".to_string(),
                    skill_id: HANDOFF_SKILL_ID.to_string(),
                    arguments: serde_json::json!({"target_agent": "writer"}),
                },
                &ctx(),
            )
            .await
            .unwrap();

        let request: HandoffRequest = serde_json::from_value(out.payload).unwrap();
        assert_eq!(request.target_agent, "writer");
        assert!(request.reason.is_empty());
        assert!(request.context.is_empty());
    }
}
