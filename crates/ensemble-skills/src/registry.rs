use crate::skill::{Skill, SkillContext, SkillDescriptor};
use ensemble_core::{EnsembleError, EnsembleResult, ToolInvocation, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Central registry for all available skills.
///
/// Populated once at startup by the host application; read-only afterwards
/// from the orchestration layer's point of view.
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
    order: Vec<String>,
}

impl SkillRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a skill under its descriptor id.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let id = skill.descriptor().id.clone();
        info!(skill = %id, "Registered skill");
        if !self.skills.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.skills.insert(id, skill);
    }

    /// Looks up a skill by id.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(id)
    }

    /// Descriptors of all registered skills, in registration order.
    pub fn descriptors(&self) -> Vec<SkillDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.skills.get(id))
            .map(|s| s.descriptor().clone())
            .collect()
    }

    /// Executes an invocation against the registered skill it names.
    pub async fn execute(
        &self,
        invocation: ToolInvocation,
        ctx: &SkillContext,
    ) -> EnsembleResult<ToolOutput> {
        let skill = self.skills.get(&invocation.skill_id).ok_or_else(|| {
            EnsembleError::Skill(format!("Unknown skill: {}", invocation.skill_id))
        })?;
        skill.execute(invocation, ctx).await
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
