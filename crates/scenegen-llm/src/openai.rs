//! OpenAI-compatible function-calling client
//!
//! Speaks the `chat/completions` endpoint with a forced function call.
//! When an `api_version` is configured the request targets an Azure
//! deployment: the version goes into the query string and the key travels
//! in the `api-key` header instead of a bearer token.

use crate::caller::FunctionCaller;
use crate::error::LlmError;
use crate::types::{ChatMessage, CompletionOptions, FunctionCall, FunctionDefinition};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Connection settings for [`OpenAiFunctionClient`]
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Base URL without trailing `/chat/completions`
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Azure style `api-version` query parameter
    pub api_version: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create config for a base URL and key
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_version: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// With `api-version` query parameter
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// With request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Azure deployments authenticate with an `api-key` header instead of a bearer token
    #[inline]
    #[must_use]
    pub fn uses_api_key_header(&self) -> bool {
        self.api_version.is_some()
    }

    /// Full completion endpoint
    #[must_use]
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.api_version {
            Some(version) => format!("{base}/chat/completions?api-version={version}"),
            None => format!("{base}/chat/completions"),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Function-calling client over HTTP
#[derive(Debug, Clone)]
pub struct OpenAiFunctionClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiFunctionClient {
    /// Create client from config
    ///
    /// # Errors
    /// `LlmError::NotConfigured` if the key is empty or the HTTP client cannot be built
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured("empty api key".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create client reading the key from an environment variable
    ///
    /// # Errors
    /// `LlmError::NotConfigured` if the variable is unset
    pub fn from_env(base_url: &str, key_var: &str) -> Result<Self, LlmError> {
        let api_key = std::env::var(key_var)
            .map_err(|_| LlmError::NotConfigured(format!("{key_var} environment variable not set")))?;
        Self::new(OpenAiConfig::new(base_url, api_key))
    }

    /// Get config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl FunctionCaller for OpenAiFunctionClient {
    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionDefinition,
        options: &CompletionOptions,
    ) -> Result<FunctionCall, LlmError> {
        let body = build_request_body(messages, function, options);
        let mut request = self.client.post(self.config.endpoint()).json(&body);
        request = if self.config.uses_api_key_header() {
            request.header("api-key", &self.config.api_key)
        } else {
            request.bearer_auth(&self.config.api_key)
        };

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::transport(format!("reading body failed: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::Request {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        tracing::debug!(
            "function call raw response: {}",
            text.chars().take(1000).collect::<String>()
        );
        parse_function_call(&text, &function.name)
    }
}

/// Build the `chat/completions` body forcing a call to `function`
#[must_use]
pub fn build_request_body(
    messages: &[ChatMessage],
    function: &FunctionDefinition,
    options: &CompletionOptions,
) -> serde_json::Value {
    serde_json::json!({
        "model": &options.model,
        "messages": messages,
        "temperature": options.temperature,
        "functions": [{
            "name": &function.name,
            "description": &function.description,
            "parameters": &function.parameters,
        }],
        "function_call": { "name": &function.name },
    })
}

#[derive(Deserialize)]
struct RawFunctionCall {
    name: String,
    // providers return arguments as a JSON string
    arguments: String,
}

#[derive(Deserialize)]
struct RawToolCall {
    function: RawFunctionCall,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    function_call: Option<RawFunctionCall>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawResponse {
    choices: Vec<RawChoice>,
}

#[derive(Deserialize)]
struct RawError {
    error: RawErrorBody,
}

#[derive(Deserialize)]
struct RawErrorBody {
    message: String,
}

/// Extract the function call from a completion response body
///
/// Accepts both the legacy `function_call` field and the `tool_calls` array.
///
/// # Errors
/// - `LlmError::InvalidResponse` if the body is not a completion response
/// - `LlmError::NoFunctionCall` if no choice carries a call to `expected`
pub fn parse_function_call(body: &str, expected: &str) -> Result<FunctionCall, LlmError> {
    let response: RawResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse completion: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::InvalidResponse("no choices".to_string()))?;

    let call = message
        .function_call
        .or_else(|| message.tool_calls.into_iter().next().map(|t| t.function))
        .ok_or_else(|| LlmError::NoFunctionCall(expected.to_string()))?;
    if call.name != expected {
        tracing::debug!("model called {} instead of {}", call.name, expected);
        return Err(LlmError::NoFunctionCall(expected.to_string()));
    }

    tracing::debug!("function call arguments: {}", call.arguments);

    Ok(FunctionCall {
        name: call.name,
        arguments: call.arguments,
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<RawError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}
