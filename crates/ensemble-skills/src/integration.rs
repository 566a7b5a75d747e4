use crate::skill::SkillDescriptor;
use async_trait::async_trait;
use ensemble_core::EnsembleResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Static description of an integration: what it is and which skills it
/// exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationDefinition {
    /// Stable identifier of the integration kind (e.g. `"calendar"`).
    pub id: String,
    /// Human-readable name, used to prefix skill descriptions.
    pub name: String,
    /// Skills this integration exposes.
    pub skills: Vec<SkillDescriptor>,
}

/// An active, user-scoped instance of an external service.
#[async_trait]
pub trait Integration: Send + Sync {
    /// The integration's definition.
    fn definition(&self) -> &IntegrationDefinition;

    /// Executes one of this integration's skills.
    async fn execute_skill(
        &self,
        skill_id: &str,
        arguments: serde_json::Value,
    ) -> EnsembleResult<serde_json::Value>;
}

/// Registry of active integration instances, keyed by user id.
#[derive(Default)]
pub struct IntegrationRegistry {
    instances: HashMap<String, Vec<Arc<dyn Integration>>>,
}

impl IntegrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active instance for a user.
    pub fn register_for_user(&mut self, user_id: impl Into<String>, instance: Arc<dyn Integration>) {
        let user_id = user_id.into();
        info!(user_id = %user_id, integration = %instance.definition().id, "Registered integration instance");
        self.instances.entry(user_id).or_default().push(instance);
    }

    /// All active instances for a user, in registration order. Users with
    /// no instances get an empty list.
    pub fn active_for_user(&self, user_id: &str) -> Vec<Arc<dyn Integration>> {
        self.instances.get(user_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ensemble_core::EnsembleError;

    struct StubIntegration {
        definition: IntegrationDefinition,
    }

    impl StubIntegration {
        fn new(id: &str, name: &str) -> Self {
            Self {
                definition: IntegrationDefinition {
                    id: id.to_string(),
                    name: name.to_string(),
                    skills: vec![SkillDescriptor {
                        id: format!("{id}_send"),
                        description: "Sends a message".to_string(),
                        parameters_schema: serde_json::json!({"type": "object"}),
                    }],
                },
            }
        }
    }

    #[async_trait]
    impl Integration for StubIntegration {
        fn definition(&self) -> &IntegrationDefinition {
            &self.definition
        }

        async fn execute_skill(
            &self,
            skill_id: &str,
            _arguments: serde_json::Value,
        ) -> EnsembleResult<serde_json::Value> {
            if skill_id.ends_with("_send") {
                Ok(serde_json::json!({"sent": true}))
            } else {
                Err(EnsembleError::Skill(format!("Unknown skill: {skill_id}")))
            }
        }
    }

    #[test]
    fn test_active_for_user_scoping() {
        let mut registry = IntegrationRegistry::new();
        registry.register_for_user("alice", Arc::new(StubIntegration::new("slack", "Slack")));
        registry.register_for_user("alice", Arc::new(StubIntegration::new("mail", "Mail")));
        registry.register_for_user("bob", Arc::new(StubIntegration::new("slack", "Slack")));

        assert_eq!(registry.active_for_user("alice").len(), 2);
        assert_eq!(registry.active_for_user("bob").len(), 1);
        assert!(registry.active_for_user("carol").is_empty());
    }

    #[tokio::test]
    async fn test_execute_skill() {
        let integration = StubIntegration::new("slack", "Slack");
        let result = integration
            .execute_skill("slack_send", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["sent"], true);
    }
}
