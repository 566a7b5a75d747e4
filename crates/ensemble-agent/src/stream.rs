use serde::{Deserialize, Serialize};

/// Events emitted by a backend while streaming a completion.
///
/// These are provider-level events; the execution unit translates them into
/// the orchestration-level [`ProgressEvent`](ensemble_core::ProgressEvent)
/// union consumed by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of generated text, in arrival order.
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// The stream finished successfully.
    Done,

    /// The stream failed mid-flight.
    Error {
        /// Failure description.
        message: String,
    },
}
