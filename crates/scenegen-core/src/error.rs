//! Error types for scenegen core
//!
//! Every batch-level failure is one of:
//! - Validation of the inbound batch (before any side effect)
//! - Hierarchy resolution (lookup/create of space, scene set, scene)
//! - API lookup and scene variable registration
//! - Generation of one (requirement, API) unit
//! - Commit of one generated step
//!
//! Errors carry the requirement index and API identifier they belong to.
//! Nothing here is retried automatically.

use scenegen_llm::LlmError;

/// Main scenegen error type
#[derive(Debug, thiserror::Error)]
pub enum SceneGenError {
    /// Batch rejected before any side effect
    #[error("invalid batch: {0}")]
    Validation(String),

    /// Inbound or outbound envelope could not be (de)serialized
    #[error("envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Lookup or create failed while resolving the target hierarchy
    #[error("requirements[{index}]: {operation} failed: {source}")]
    Resolution {
        /// Requirement position in the batch
        index: usize,
        /// Failing capability, e.g. "create autotest scene set"
        operation: &'static str,
        /// Collaborator error
        #[source]
        source: PlatformError,
    },

    /// API selector expansion or API detail lookup failed
    #[error("requirements[{index}]: get api info for api index {api_index_id} failed: {source}")]
    ApiLookup {
        /// Requirement position in the batch
        index: usize,
        /// API index id, 0 while expanding the selector
        api_index_id: u64,
        /// Collaborator error
        #[source]
        source: PlatformError,
    },

    /// Registering a scene input/output failed
    #[error(
        "requirements[{index}]: register scene variable for api index {api_index_id} \
         [method={method} path={path}] failed: {source}"
    )]
    VariableRegistration {
        /// Requirement position in the batch
        index: usize,
        /// API index id
        api_index_id: u64,
        /// HTTP method of the API
        method: String,
        /// Path of the API
        path: String,
        /// Collaborator error
        #[source]
        source: PlatformError,
    },

    /// Model invocation or argument decoding failed for one unit
    #[error("requirements[{index}]: generate step for api index {api_index_id} failed: {reason}")]
    Generation {
        /// Requirement position in the batch
        index: usize,
        /// API index id
        api_index_id: u64,
        /// What went wrong
        reason: GenerationFailure,
    },

    /// Persisting a generated or adjusted step failed
    #[error("requirements[{index}]: commit step for api index {api_index_id} failed: {source}")]
    Commit {
        /// Requirement position in the batch
        index: usize,
        /// API index id
        api_index_id: u64,
        /// Collaborator error
        #[source]
        source: PlatformError,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Batch cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl SceneGenError {
    /// Check if the error stops the whole batch regardless of failure policy
    #[inline]
    #[must_use]
    pub fn is_batch_fatal(&self) -> bool {
        !self.is_unit_scoped()
    }

    /// Check if the error belongs to a single (requirement, API) unit
    #[inline]
    #[must_use]
    pub fn is_unit_scoped(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Commit { .. })
    }

    /// Requirement index the error belongs to, if any
    #[must_use]
    pub fn requirement_index(&self) -> Option<usize> {
        match self {
            Self::Resolution { index, .. }
            | Self::ApiLookup { index, .. }
            | Self::VariableRegistration { index, .. }
            | Self::Generation { index, .. }
            | Self::Commit { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// API index id the error belongs to, if any
    #[must_use]
    pub fn api_index_id(&self) -> Option<u64> {
        match self {
            Self::ApiLookup { api_index_id, .. }
            | Self::VariableRegistration { api_index_id, .. }
            | Self::Generation { api_index_id, .. }
            | Self::Commit { api_index_id, .. } => Some(*api_index_id),
            _ => None,
        }
    }
}

impl From<Cancelled> for SceneGenError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Why a generation unit failed
#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    /// Provider call failed
    #[error("function call failed: {0}")]
    Provider(#[from] LlmError),

    /// Arguments were not a valid step specification
    #[error("unmarshal function arguments failed: {0}")]
    MalformedArguments(#[source] serde_json::Error),

    /// Step specification could not be serialized
    #[error("encode step value failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// API detail could not be loaded
    #[error("get api info failed: {0}")]
    ApiDetail(#[source] PlatformError),

    /// Prompt context could not be gathered
    #[error("build context prompt failed: {0}")]
    Context(#[source] PlatformError),
}

/// Error reported by a persistence or catalog collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// Entity does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "scene"
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Request rejected by the platform
    #[error("rejected: {0}")]
    Rejected(String),

    /// Platform unreachable
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    /// Create not-found error
    #[inline]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Marker returned when the batch token fires during an external call
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_names_index_and_operation() {
        let err = SceneGenError::Resolution {
            index: 2,
            operation: "get autotest scene by ID",
            source: PlatformError::not_found("scene", 9),
        };
        let text = err.to_string();
        assert!(text.contains("requirements[2]"));
        assert!(text.contains("get autotest scene by ID"));
        assert!(text.contains("scene 9 not found"));
        assert!(err.is_batch_fatal());
        assert_eq!(err.requirement_index(), Some(2));
    }

    #[test]
    fn unit_errors_are_not_batch_fatal() {
        let gen = SceneGenError::Generation {
            index: 0,
            api_index_id: 7,
            reason: GenerationFailure::Provider(LlmError::NoFunctionCall("f".into())),
        };
        assert!(gen.is_unit_scoped());
        assert!(!gen.is_batch_fatal());
        assert!(gen.to_string().contains("api index 7"));

        let commit = SceneGenError::Commit {
            index: 1,
            api_index_id: 3,
            source: PlatformError::Rejected("duplicate".into()),
        };
        assert!(commit.is_unit_scoped());
    }

    #[test]
    fn validation_and_cancel_have_no_index() {
        assert_eq!(SceneGenError::Validation("x".into()).requirement_index(), None);
        assert!(matches!(SceneGenError::from(Cancelled), SceneGenError::Cancelled));
    }
}
