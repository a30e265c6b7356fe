//! Error types for the function-calling seam

/// Errors raised while invoking a function-calling provider
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Client could not be built (missing key, bad URL)
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Transport failure or non-success status
    #[error("provider request failed (status {status}): {message}")]
    Request {
        /// HTTP status, 0 when no response was received
        status: u16,
        /// Provider or transport message
        message: String,
    },

    /// Reply body did not have the expected shape
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Model answered without calling the function
    #[error("model returned no function call for '{0}'")]
    NoFunctionCall(String),
}

impl LlmError {
    /// Create request error without a status
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Request {
            status: 0,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_has_zero_status() {
        let err = LlmError::transport("connection reset");
        assert!(matches!(err, LlmError::Request { status: 0, .. }));
        assert!(err.to_string().contains("connection reset"));
    }
}
