//! Generator configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [llm]
//! base_url = "https://my-azure.openai.azure.com/openai/deployments/gpt-35"
//! api_version = "2023-07-01-preview"
//!
//! [generation]
//! dispatch = "concurrent"
//! max_concurrency = 4
//! failure_policy = "partial"
//! ```

use crate::error::SceneGenError;
use scenegen_llm::OpenAiConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Language model endpoint
    pub llm: LlmSettings,
    /// Fan-out and failure handling
    pub generation: GenerationSettings,
    /// Names of created hierarchy entities
    pub naming: NamingSettings,
}

impl GeneratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML and validate
    ///
    /// # Errors
    /// `SceneGenError::Config` on syntax errors or invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, SceneGenError> {
        let config: Self =
            toml::from_str(text).map_err(|e| SceneGenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `SceneGenError::Config` if the file cannot be read or is invalid
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SceneGenError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SceneGenError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `SceneGenError::Config` naming the offending field
    pub fn validate(&self) -> Result<(), SceneGenError> {
        if self.generation.max_concurrency == 0 {
            return Err(SceneGenError::Config(
                "generation.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.generation.api_cache_capacity == 0 {
            return Err(SceneGenError::Config(
                "generation.api_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(SceneGenError::Config("llm.base_url is empty".to_string()));
        }
        Ok(())
    }

    /// With dispatch mode
    #[inline]
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.generation.dispatch = dispatch;
        self
    }

    /// With failure policy
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.generation.failure_policy = policy;
        self
    }

    /// With max concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.generation.max_concurrency = max;
        self
    }

    /// Number of units allowed in flight
    #[inline]
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        match self.generation.dispatch {
            DispatchMode::Sequential => 1,
            DispatchMode::Concurrent => self.generation.max_concurrency.max(1),
        }
    }
}

/// Language model endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Azure `api-version`; `None` talks plain OpenAI with a bearer token.
    /// Set it together with an Azure deployment `base_url`.
    pub api_version: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_version: None,
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    /// Client settings for the function-calling endpoint
    #[must_use]
    pub fn client_config(&self, api_key: impl Into<String>) -> OpenAiConfig {
        let config = OpenAiConfig::new(&self.base_url, api_key)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.api_version {
            Some(version) => config.with_api_version(version),
            None => config,
        }
    }
}

/// How generation units are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Up to `max_concurrency` units in flight
    #[default]
    Concurrent,
    /// One unit at a time, in selector order
    Sequential,
}

/// What a failed unit does to the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first unit failure cancels units not yet committed and is returned
    #[default]
    FailFast,
    /// Siblings finish and failures are listed in the response
    Partial,
}

/// Fan-out settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Scheduling mode
    pub dispatch: DispatchMode,
    /// Units in flight for concurrent dispatch
    pub max_concurrency: usize,
    /// Failure handling
    pub failure_policy: FailurePolicy,
    /// Commit steps of one scene in selector order
    pub ordered_commits: bool,
    /// Capacity of the per-batch API detail cache
    pub api_cache_capacity: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Concurrent,
            max_concurrency: 8,
            failure_policy: FailurePolicy::FailFast,
            ordered_commits: true,
            api_cache_capacity: 1024,
        }
    }
}

/// Names of created hierarchy entities: prefix + asset id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingSettings {
    /// Space name prefix
    pub space_prefix: String,
    /// Scene set name prefix
    pub scene_set_prefix: String,
    /// Scene name prefix
    pub scene_prefix: String,
    /// Created space description
    pub space_description: String,
    /// Created scene set description
    pub scene_set_description: String,
    /// Created scene description
    pub scene_description: String,
}

impl NamingSettings {
    /// Space name for an asset
    #[inline]
    #[must_use]
    pub fn space_name(&self, asset_id: &str) -> String {
        format!("{}{asset_id}", self.space_prefix)
    }

    /// Scene set name for an asset
    #[inline]
    #[must_use]
    pub fn scene_set_name(&self, asset_id: &str) -> String {
        format!("{}{asset_id}", self.scene_set_prefix)
    }

    /// Scene name for an asset
    #[inline]
    #[must_use]
    pub fn scene_name(&self, asset_id: &str) -> String {
        format!("{}{asset_id}", self.scene_prefix)
    }
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            space_prefix: "AI_Generated_Space_".to_string(),
            scene_set_prefix: "AI_Generated_SceneSet_".to_string(),
            scene_prefix: "AI_Generated_Scene_".to_string(),
            space_description: "AI Generated AutoTest Space".to_string(),
            scene_set_description: "AI Generated AutoTest Scene Set".to_string(),
            scene_description: "AI Generated AutoTest Scene".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = GeneratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.effective_concurrency(), 8);
        assert!(config.generation.ordered_commits);
    }

    #[test]
    fn toml_overrides() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            [llm]
            base_url = "http://localhost:8080/v1"

            [generation]
            dispatch = "sequential"
            failure_policy = "partial"

            [naming]
            scene_prefix = "Gen_"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.generation.dispatch, DispatchMode::Sequential);
        assert_eq!(config.generation.failure_policy, FailurePolicy::Partial);
        assert_eq!(config.effective_concurrency(), 1);
        assert_eq!(config.naming.scene_name("pets"), "Gen_pets");
        assert_eq!(config.naming.space_name("pets"), "AI_Generated_Space_pets");
    }

    #[test]
    fn default_endpoint_uses_bearer_auth() {
        let client = LlmSettings::default().client_config("k");
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert!(!client.uses_api_key_header());
        assert_eq!(client.timeout, Duration::from_secs(120));
    }

    #[test]
    fn azure_deployment_uses_api_key_header() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            [llm]
            base_url = "https://my-azure.openai.azure.com/openai/deployments/gpt-35"
            api_version = "2023-07-01-preview"
            "#,
        )
        .unwrap();

        let client = config.llm.client_config("k");
        assert!(client.uses_api_key_header());
        assert!(client.endpoint().ends_with("/chat/completions?api-version=2023-07-01-preview"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = GeneratorConfig::from_toml_str("[generation]\nmax_concurrency = 0").unwrap_err();
        assert!(matches!(err, SceneGenError::Config(msg) if msg.contains("max_concurrency")));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenegen.toml");
        let config = GeneratorConfig::new().with_max_concurrency(3);
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = GeneratorConfig::from_path(&path).unwrap();
        assert_eq!(loaded.generation.max_concurrency, 3);
    }
}
