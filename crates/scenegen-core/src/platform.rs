//! Collaborator capabilities
//!
//! The engine owns no persistent state. Everything it reads or writes goes
//! through three traits:
//! - [`SceneStore`]: spaces, scene sets, scenes, scene variables and steps
//! - [`ApiCatalog`]: API operations of an asset version
//! - [`StepContextSource`]: variables visible at a scene step
//!
//! Implementations are treated as independently concurrency-safe services.

use crate::error::PlatformError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Create-space request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpace {
    /// Space name
    pub name: String,
    /// Owning project
    pub project_id: u64,
    /// Description
    pub description: String,
    /// Acting user
    pub user_id: String,
}

/// Create-scene-set request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSceneSet {
    /// Scene set name
    pub name: String,
    /// Description
    pub description: String,
    /// Parent space
    pub space_id: u64,
    /// Owning project
    pub project_id: u64,
    /// Acting user
    pub user_id: String,
}

/// Create-scene request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateScene {
    /// Scene name
    pub name: String,
    /// Description
    pub description: String,
    /// Parent space
    pub space_id: u64,
    /// Parent scene set
    pub scene_set_id: u64,
    /// Acting user
    pub user_id: String,
}

/// Parents of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneInfo {
    /// Space id
    pub space_id: u64,
    /// Scene set id
    pub scene_set_id: u64,
}

/// Parent of a scene set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSetInfo {
    /// Space id
    pub space_id: u64,
}

/// Scene input or output registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneVariable {
    /// Variable name
    pub name: String,
    /// Description
    pub description: String,
    /// Value
    pub value: String,
    /// Temporary (debug) value
    pub temp: String,
    /// Space id
    pub space_id: u64,
    /// Scene set id
    pub scene_set_id: u64,
    /// Scene id
    pub scene_id: u64,
    /// Acting user (creator and updater)
    pub user_id: String,
}

/// API operation detail as declared in the asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOperation {
    /// Operation record id
    pub id: u64,
    /// Operation id from the document
    #[serde(default)]
    pub operation_id: String,
    /// HTTP method
    pub method: String,
    /// URL path
    pub path: String,
    /// Summary / description
    #[serde(default)]
    pub description: String,
    /// Declared parameters
    #[serde(default)]
    pub parameters: Vec<ApiParameter>,
    /// Declared headers
    #[serde(default)]
    pub headers: Vec<ApiParameter>,
    /// Declared responses
    #[serde(default)]
    pub responses: Vec<ApiResponse>,
}

/// Declared parameter or header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParameter {
    /// Name
    pub name: String,
    /// Location: query, path, header, cookie
    #[serde(rename = "in", default)]
    pub location: String,
    /// Whether the parameter is mandatory
    #[serde(default)]
    pub required: bool,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// Declared response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// Status code, e.g. "200" or "default"
    pub status_code: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// A variable visible to a scene step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextVariable {
    /// Variable name
    pub name: String,
    /// Expression that references it inside a step
    pub expression: String,
    /// Current value, if known
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Space, scene set, scene and step persistence
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// Create a space, returning its id
    async fn create_space(&self, request: &CreateSpace) -> Result<u64, PlatformError>;

    /// Create a scene set, returning its id
    async fn create_scene_set(&self, request: &CreateSceneSet) -> Result<u64, PlatformError>;

    /// Create a scene, returning its id
    async fn create_scene(&self, request: &CreateScene) -> Result<u64, PlatformError>;

    /// Look up the parents of a scene
    async fn get_scene(&self, scene_id: u64, user_id: &str) -> Result<SceneInfo, PlatformError>;

    /// Look up the parent of a scene set
    async fn get_scene_set(
        &self,
        scene_set_id: u64,
        user_id: &str,
    ) -> Result<SceneSetInfo, PlatformError>;

    /// Register a scene input
    async fn create_scene_input(&self, variable: &SceneVariable) -> Result<u64, PlatformError>;

    /// Register a scene output
    async fn create_scene_output(&self, variable: &SceneVariable) -> Result<u64, PlatformError>;

    /// Persist a scene step, returning its id
    async fn create_scene_step(
        &self,
        request: &crate::types::SceneStepRequest,
    ) -> Result<u64, PlatformError>;
}

/// API operations of an asset
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ApiCatalog: Send + Sync {
    /// Operation detail by API index id
    async fn get_api_operation(
        &self,
        org_id: u64,
        user_id: &str,
        api_index_id: u64,
    ) -> Result<ApiOperation, PlatformError>;

    /// Every API index id of an asset version, in document order
    async fn list_api_index_ids(
        &self,
        org_id: u64,
        user_id: &str,
        asset_id: &str,
        version_id: u64,
    ) -> Result<Vec<u64>, PlatformError>;

    /// API index id of an operation id inside an asset version
    async fn find_api_index_id(
        &self,
        org_id: u64,
        user_id: &str,
        asset_id: &str,
        version_id: u64,
        operation_id: &str,
    ) -> Result<u64, PlatformError>;
}

/// Variables visible at a scene step
///
/// `step_id` 0 addresses a step appended at the end of the scene.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait StepContextSource: Send + Sync {
    /// Scene-level inputs
    async fn scene_inputs(
        &self,
        scene_id: u64,
        user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError>;

    /// Outputs of the steps before `step_id`
    async fn preceding_step_outputs(
        &self,
        step_id: u64,
        scene_id: u64,
        user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError>;

    /// Outputs of the configuration sheets before `step_id`
    async fn preceding_config_sheet_outputs(
        &self,
        step_id: u64,
        scene_id: u64,
        user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError>;

    /// Global configuration outputs
    async fn global_config_outputs(
        &self,
        scene_id: u64,
        user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError>;

    /// Mock inputs
    async fn mock_inputs(
        &self,
        scene_id: u64,
        user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError>;
}
