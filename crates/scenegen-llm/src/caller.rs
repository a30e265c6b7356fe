//! The provider seam

use crate::error::LlmError;
use crate::types::{ChatMessage, CompletionOptions, FunctionCall, FunctionDefinition};

/// A language-model service that answers with structured arguments
/// for a forced function call instead of free text.
///
/// Implementations must be safe to share between concurrently running
/// generation units.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait::async_trait]
pub trait FunctionCaller: Send + Sync {
    /// Invoke the model, forcing a call to `function`.
    ///
    /// # Errors
    /// - `LlmError::Request` if the provider rejects the call
    /// - `LlmError::InvalidResponse` if the reply cannot be parsed
    /// - `LlmError::NoFunctionCall` if the model answered without calling the function
    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionDefinition,
        options: &CompletionOptions,
    ) -> Result<FunctionCall, LlmError>;
}
