//! Requirement model
//!
//! Defines the types flowing through one batch:
//! - Inbound envelope and requirements
//! - Target hierarchy coordinates (0 means unresolved)
//! - Per-unit generation input
//! - Scene-step write request and step result

use serde::{Deserialize, Serialize};

/// Inbound "apply AI function" envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Name of the function to apply
    #[serde(default)]
    pub function_name: String,
    /// Caller identity
    #[serde(default)]
    pub background: Background,
    /// Function specific parameters
    #[serde(default)]
    pub function_params: FunctionParams,
    /// Stage generated steps for review instead of committing them
    #[serde(default)]
    pub need_adjust: bool,
}

/// Caller identity carried by the envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    /// Organization id
    #[serde(rename = "orgID", default)]
    pub org_id: u64,
    /// Project id
    #[serde(rename = "projectID", default)]
    pub project_id: u64,
    /// Acting user id
    #[serde(rename = "userID", default)]
    pub user_id: String,
}

/// Parameters of the scene generation function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionParams {
    /// Requirements in batch order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
}

/// One user-submitted unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Caller supplied operation id (informational)
    #[serde(rename = "operationID", default, skip_serializing_if = "is_zero")]
    pub operation_id: u64,
    /// Free-text prompt replacing the fixed user prompt
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    /// Human-approved step to commit verbatim
    #[serde(rename = "autoTestSceneCreateReq", default, skip_serializing_if = "Option::is_none")]
    pub adjusted: Option<SceneStepRequest>,
    /// Target API selection
    #[serde(rename = "apis", default)]
    pub apis: ApiSelector,
    /// Target hierarchy, possibly partial
    #[serde(rename = "scene", default)]
    pub target: TargetHierarchy,
}

impl Requirement {
    /// Create requirement for an asset
    #[inline]
    #[must_use]
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            apis: ApiSelector {
                asset_id: asset_id.into(),
                ..ApiSelector::default()
            },
            ..Self::default()
        }
    }

    /// With asset version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version_id: u64) -> Self {
        self.apis.version_id = version_id;
        self
    }

    /// With API index ids (order defines step order)
    #[inline]
    #[must_use]
    pub fn with_api_index_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.apis.api_index_ids = ids.into_iter().collect();
        self
    }

    /// With target hierarchy
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: TargetHierarchy) -> Self {
        self.target = target;
        self
    }

    /// With prompt override
    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// With human-adjusted request
    #[inline]
    #[must_use]
    pub fn with_adjusted(mut self, request: SceneStepRequest) -> Self {
        self.adjusted = Some(request);
        self
    }

    /// Whether this requirement replays an adjusted request
    #[inline]
    #[must_use]
    pub fn is_adjusted(&self) -> bool {
        self.adjusted.is_some()
    }
}

/// Ordered selection of API operations inside one asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSelector {
    /// API asset id, must be non-empty
    #[serde(rename = "apiAssetId", default)]
    pub asset_id: String,
    /// Asset version id
    #[serde(rename = "apiVersionId", default)]
    pub version_id: u64,
    /// API index ids; order defines generated step order
    #[serde(rename = "apiIndexIds", default, skip_serializing_if = "Vec::is_empty")]
    pub api_index_ids: Vec<u64>,
    /// Operation ids, resolved to index ids after the explicit ones
    #[serde(rename = "apiOperationIds", default, skip_serializing_if = "Vec::is_empty")]
    pub api_operation_ids: Vec<String>,
}

impl ApiSelector {
    /// Neither index ids nor operation ids given: select the whole asset
    #[inline]
    #[must_use]
    pub fn selects_all(&self) -> bool {
        self.api_index_ids.is_empty() && self.api_operation_ids.is_empty()
    }
}

/// Space / scene set / scene coordinates; 0 means unresolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetHierarchy {
    /// Space id
    #[serde(rename = "autotestSpaceId", default)]
    pub space_id: u64,
    /// Scene set id
    #[serde(rename = "autotestSceneSetId", default)]
    pub scene_set_id: u64,
    /// Scene id
    #[serde(rename = "autotestSceneId", default)]
    pub scene_id: u64,
}

impl TargetHierarchy {
    /// Create coordinates
    #[inline]
    #[must_use]
    pub fn new(space_id: u64, scene_set_id: u64, scene_id: u64) -> Self {
        Self {
            space_id,
            scene_set_id,
            scene_id,
        }
    }

    /// All three coordinates are set
    #[inline]
    #[must_use]
    pub fn is_fully_specified(&self) -> bool {
        self.space_id > 0 && self.scene_set_id > 0 && self.scene_id > 0
    }

    /// Presence bits: space = 0b100, scene set = 0b010, scene = 0b001
    #[inline]
    #[must_use]
    pub fn presence_key(&self) -> u8 {
        (u8::from(self.space_id > 0) << 2)
            | (u8::from(self.scene_set_id > 0) << 1)
            | u8::from(self.scene_id > 0)
    }
}

/// Fully resolved hierarchy plus names of entities created in this pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedHierarchy {
    /// Resolved coordinates, all positive
    pub ids: TargetHierarchy,
    /// Name of the created space, empty when looked up or given
    pub space_name: String,
    /// Name of the created scene set, empty when looked up or given
    pub scene_set_name: String,
    /// Name of the created scene, empty when looked up or given
    pub scene_name: String,
}

/// Read-only input of one generation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationInput {
    /// Requirement position in the batch
    pub requirement_index: usize,
    /// API asset id
    pub asset_id: String,
    /// Asset version id
    pub version_id: u64,
    /// API index id
    pub api_index_id: u64,
    /// Operation record id (becomes the step's api spec id)
    pub api_operation_id: u64,
    /// API summary name
    pub api_name: String,
    /// HTTP method
    pub api_method: String,
    /// URL path
    pub api_url: String,
    /// Acting user
    pub user_id: String,
    /// Where the step goes
    pub hierarchy: ResolvedHierarchy,
    /// Prompt override, empty for the fixed user prompt
    pub prompt: String,
}

/// Scene-step write request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStepRequest {
    /// Space id
    #[serde(rename = "spaceID", default)]
    pub space_id: u64,
    /// Scene id
    #[serde(rename = "sceneID", default)]
    pub scene_id: u64,
    /// Serialized step specification
    #[serde(default)]
    pub value: String,
    /// Acting user
    #[serde(rename = "userID", default)]
    pub user_id: String,
    /// API operation the step exercises
    #[serde(rename = "apiSpecID", default)]
    pub api_spec_id: u64,
    /// Step name
    #[serde(default)]
    pub name: String,
}

/// Outcome of one generation unit
///
/// `step_id` is present only when the step was committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Staged or committed write request
    #[serde(rename = "autotestSceneCreateReq")]
    pub request: SceneStepRequest,
    /// Space name (when created in this batch)
    #[serde(rename = "autotestSpaceName", default, skip_serializing_if = "String::is_empty")]
    pub space_name: String,
    /// Space id
    #[serde(rename = "autotestSpaceID", default)]
    pub space_id: u64,
    /// Scene set name (when created in this batch)
    #[serde(rename = "autotestSceneSetName", default, skip_serializing_if = "String::is_empty")]
    pub scene_set_name: String,
    /// Scene set id
    #[serde(rename = "autotestSceneSetID", default)]
    pub scene_set_id: u64,
    /// Scene name (when created in this batch)
    #[serde(rename = "autotestSceneName", default, skip_serializing_if = "String::is_empty")]
    pub scene_name: String,
    /// Scene id
    #[serde(rename = "autotestSceneID", default)]
    pub scene_id: u64,
    /// Committed step id
    #[serde(rename = "autotestSceneStepID", default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<u64>,
}

impl StepResult {
    /// Staged result for a request and hierarchy
    #[must_use]
    pub fn staged(request: SceneStepRequest, hierarchy: &ResolvedHierarchy) -> Self {
        Self {
            request,
            space_name: hierarchy.space_name.clone(),
            space_id: hierarchy.ids.space_id,
            scene_set_name: hierarchy.scene_set_name.clone(),
            scene_set_id: hierarchy.ids.scene_set_id,
            scene_name: hierarchy.scene_name.clone(),
            scene_id: hierarchy.ids.scene_id,
            step_id: None,
        }
    }

    /// Mark as committed
    #[inline]
    #[must_use]
    pub fn committed(mut self, step_id: u64) -> Self {
        self.step_id = Some(step_id);
        self
    }

    /// Whether the step was persisted
    #[inline]
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.step_id.is_some()
    }
}

/// Aggregate response envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResponse {
    /// No unit failed
    pub success: bool,
    /// One result per successful unit
    #[serde(default)]
    pub data: Vec<StepResult>,
    /// Unit failures (partial failure policy only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ResponseError>,
}

/// Failure listing of a partially successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Summary message
    pub msg: String,
    /// One entry per failed unit
    #[serde(default)]
    pub failures: Vec<UnitFailure>,
}

/// One failed (requirement, API) unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    /// Requirement position in the batch
    pub requirement_index: usize,
    /// API index id
    pub api_index_id: u64,
    /// Error text
    pub message: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &u64) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn presence_key_bits() {
        assert_eq!(TargetHierarchy::new(0, 0, 0).presence_key(), 0b000);
        assert_eq!(TargetHierarchy::new(0, 0, 5).presence_key(), 0b001);
        assert_eq!(TargetHierarchy::new(0, 5, 0).presence_key(), 0b010);
        assert_eq!(TargetHierarchy::new(5, 0, 0).presence_key(), 0b100);
        assert_eq!(TargetHierarchy::new(1, 2, 3).presence_key(), 0b111);
        assert!(TargetHierarchy::new(1, 2, 3).is_fully_specified());
        assert!(!TargetHierarchy::new(1, 0, 3).is_fully_specified());
    }

    #[test]
    fn requirement_decodes_wire_names() {
        let json = serde_json::json!({
            "prompt": "focus on error codes",
            "apis": {
                "apiAssetId": "csrf-go-http-demo",
                "apiVersionId": 537,
                "apiIndexIds": [11, 12]
            },
            "scene": { "autotestSpaceId": 3 }
        });
        let req: Requirement = serde_json::from_value(json).unwrap();
        assert_eq!(req.apis.asset_id, "csrf-go-http-demo");
        assert_eq!(req.apis.version_id, 537);
        assert_eq!(req.apis.api_index_ids, vec![11, 12]);
        assert_eq!(req.target, TargetHierarchy::new(3, 0, 0));
        assert_eq!(req.prompt, "focus on error codes");
        assert!(!req.is_adjusted());
    }

    #[test]
    fn envelope_decodes_background_and_flag() {
        let json = r#"{
            "functionName": "create-autotest-scene",
            "background": {"orgID": 1, "projectID": 2, "userID": "u-1"},
            "functionParams": {"requirements": [{"apis": {"apiAssetId": "a"}}]},
            "needAdjust": true
        }"#;
        let req: ApplyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.background.org_id, 1);
        assert_eq!(req.background.project_id, 2);
        assert_eq!(req.background.user_id, "u-1");
        assert!(req.need_adjust);
        assert_eq!(req.function_params.requirements.len(), 1);
    }

    #[test]
    fn staged_result_has_no_step_id() {
        let hierarchy = ResolvedHierarchy {
            ids: TargetHierarchy::new(1, 2, 3),
            scene_name: "AI_Generated_Scene_a".into(),
            ..ResolvedHierarchy::default()
        };
        let staged = StepResult::staged(SceneStepRequest::default(), &hierarchy);
        assert!(!staged.is_committed());
        assert_eq!(staged.scene_id, 3);

        let json = serde_json::to_value(&staged).unwrap();
        assert!(json.get("autotestSceneStepID").is_none());
        assert_eq!(json["autotestSceneName"], "AI_Generated_Scene_a");

        assert_eq!(staged.committed(42).step_id, Some(42));
    }

    fn arb_request() -> impl Strategy<Value = SceneStepRequest> {
        (any::<u64>(), any::<u64>(), ".*", "[a-z0-9-]{0,12}", any::<u64>(), ".*").prop_map(
            |(space_id, scene_id, value, user_id, api_spec_id, name)| SceneStepRequest {
                space_id,
                scene_id,
                value,
                user_id,
                api_spec_id,
                name,
            },
        )
    }

    fn arb_result() -> impl Strategy<Value = StepResult> {
        (
            arb_request(),
            "[A-Za-z_]{0,16}",
            any::<u64>(),
            "[A-Za-z_]{0,16}",
            any::<u64>(),
            "[A-Za-z_]{0,16}",
            any::<u64>(),
            proptest::option::of(any::<u64>()),
        )
            .prop_map(
                |(
                    request,
                    space_name,
                    space_id,
                    scene_set_name,
                    scene_set_id,
                    scene_name,
                    scene_id,
                    step_id,
                )| StepResult {
                    request,
                    space_name,
                    space_id,
                    scene_set_name,
                    scene_set_id,
                    scene_name,
                    scene_id,
                    step_id,
                },
            )
    }

    proptest! {
        #[test]
        fn step_result_survives_the_response_envelope(result in arb_result()) {
            let response = ApplyResponse { success: true, data: vec![result.clone()], err: None };
            let bytes = serde_json::to_vec(&response).unwrap();
            let parsed: ApplyResponse = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(parsed.data.len(), 1);
            prop_assert_eq!(&parsed.data[0], &result);
        }
    }
}
