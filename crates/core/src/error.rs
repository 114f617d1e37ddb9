//! Error types for the Gradwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Errors surfaced by the structured-state collaborator.
#[derive(Debug, Error)]
pub enum Error {
    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool panicked: {tool_name}: {reason}")]
    Panicked { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Why a decision document returned by the completion backend was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionParseError {
    #[error("reply contains no JSON object")]
    NoDocument,

    #[error("decision document does not match schema: {0}")]
    Schema(String),

    #[error("use_tool is {use_tool} but tool_name is {tool_name:?}")]
    InconsistentFlag {
        use_tool: bool,
        tool_name: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn memory_error_converts_into_error() {
        let err: Error = MemoryError::Storage("disk full".into()).into();
        assert_eq!(err.to_string(), "Memory error: Storage error: disk full");
    }

    #[test]
    fn unknown_tool_message_names_the_tool() {
        let err = ToolError::NotFound("essay_grader".into());
        assert_eq!(err.to_string(), "unknown tool: essay_grader");
    }

    #[test]
    fn inconsistent_flag_is_descriptive() {
        let err = DecisionParseError::InconsistentFlag {
            use_tool: true,
            tool_name: None,
        };
        assert!(err.to_string().contains("use_tool is true"));
    }
}
