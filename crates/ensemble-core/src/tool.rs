use serde::{Deserialize, Serialize};

/// A request from the model to invoke a specific skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier assigned by the model for this invocation.
    pub id: String,
    /// Id of the skill to invoke.
    pub skill_id: String,
    /// JSON arguments to pass to the skill.
    pub arguments: serde_json::Value,
}

/// The result returned after executing a [`ToolInvocation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The id of the invocation this output corresponds to.
    pub invocation_id: String,
    /// Structured payload produced by the skill.
    pub payload: serde_json::Value,
    /// Whether the skill execution ended in an error.
    pub is_error: bool,
}

impl ToolOutput {
    /// Creates a successful tool output.
    pub fn success(invocation_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload,
            is_error: false,
        }
    }

    /// Creates an error tool output with a textual description.
    pub fn error(invocation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload: serde_json::Value::String(message.into()),
            is_error: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_success() {
        let out = ToolOutput::success("call_1", serde_json::json!({"ok": true}));
        assert!(!out.is_error);
        assert_eq!(out.payload["ok"], true);
    }

    #[test]
    fn test_tool_output_error() {
        let out = ToolOutput::error("call_1", "boom");
        assert!(out.is_error);
        assert_eq!(out.payload, serde_json::json!("boom"));
    }
}
