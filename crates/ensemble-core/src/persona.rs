use serde::{Deserialize, Serialize};

/// Static configuration describing one agent: its role, system prompt, and
/// tool access.
///
/// Personas are immutable; they are owned by whoever constructs the roster
/// (a preset catalog or a user-defined record) and are materialized into
/// execution units once per router/orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPersona {
    /// Stable identifier, unique within a roster.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Short role description, also used for keyword suitability scoring.
    pub role: String,
    /// The system prompt sent as the first message of every invocation.
    pub system_prompt: String,
    /// Sampling temperature override; falls back to the model default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token limit override; falls back to the model default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Skill ids this agent may use. Empty means all registered skills.
    #[serde(default)]
    pub skill_ids: Vec<String>,
    /// Integration ids this agent may use. Empty means all active integrations.
    #[serde(default)]
    pub integration_ids: Vec<String>,
}

impl AgentPersona {
    /// Creates a persona with the given identity and prompt, no overrides,
    /// and unrestricted tool access.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            system_prompt: system_prompt.into(),
            temperature: None,
            max_tokens: None,
            skill_ids: Vec::new(),
            integration_ids: Vec::new(),
        }
    }

    /// Sets a sampling temperature override (builder pattern).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Restricts this agent to the given skill ids (builder pattern).
    pub fn with_skills(mut self, skill_ids: Vec<String>) -> Self {
        self.skill_ids = skill_ids;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_defaults() {
        let p = AgentPersona::new("researcher", "Researcher", "research analyst", "You research.");
        assert!(p.temperature.is_none());
        assert!(p.skill_ids.is_empty());
        assert!(p.integration_ids.is_empty());
    }

    #[test]
    fn test_persona_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "writer",
            "name": "Writer",
            "role": "technical writer",
            "system_prompt": "You write."
        }"#;
        let p: AgentPersona = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, "writer");
        assert!(p.max_tokens.is_none());
        assert!(p.skill_ids.is_empty());
    }

    #[test]
    fn test_persona_builder() {
        let p = AgentPersona::new("a", "A", "analyst", "prompt")
            .with_temperature(0.2)
            .with_skills(vec!["search".to_string()]);
        assert_eq!(p.temperature, Some(0.2));
        assert_eq!(p.skill_ids, vec!["search"]);
    }
}
