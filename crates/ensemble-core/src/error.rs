use thiserror::Error;

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Top-level error type for the Ensemble orchestration core.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// An error originating from a single agent invocation.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from the message router.
    #[error("Router error: {0}")]
    Router(String),

    /// An error from the team orchestrator, including structural
    /// configuration errors such as a missing supervisor.
    #[error("Team error: {0}")]
    Team(String),

    /// An error from the swarm orchestrator.
    #[error("Swarm error: {0}")]
    Swarm(String),

    /// An error raised by a skill or integration during invocation.
    #[error("Skill error: {0}")]
    Skill(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request (e.g. a model API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnsembleError::Agent("model call failed".to_string());
        assert_eq!(err.to_string(), "Agent error: model call failed");

        let err = EnsembleError::Team("Supervisor agent not found".to_string());
        assert_eq!(err.to_string(), "Team error: Supervisor agent not found");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: EnsembleError = json_err.into();
        assert!(matches!(err, EnsembleError::Json(_)));
    }
}
