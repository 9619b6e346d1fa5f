//! Error types for the language-model boundary.

/// Errors that can occur while talking to a language model.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP call to the backend failed or returned a bad status.
    #[error("llm backend error: {0}")]
    Backend(String),

    /// The model's response could not be parsed into the expected shape.
    #[error("llm parse error: {0}")]
    Parse(String),

    /// A prompt template failed to render.
    #[error("prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    /// The call exceeded its wall-time deadline.
    #[error("llm call timed out after {0:?}")]
    Timeout(std::time::Duration),
}
