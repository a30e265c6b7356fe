//! In-memory platform that records every call

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use scenegen_core::{
    ApiCatalog, ApiOperation, ContextVariable, CreateScene, CreateSceneSet, CreateSpace,
    PlatformError, SceneInfo, SceneSetInfo, SceneStepRequest, SceneStore, SceneVariable,
    StepContextSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateSpace(CreateSpace),
    CreateSceneSet(CreateSceneSet),
    CreateScene(CreateScene),
    GetScene(u64),
    GetSceneSet(u64),
    GetApiOperation(u64),
    ListApis { asset_id: String, version_id: u64 },
    FindApi { asset_id: String, operation_id: String },
    SceneInput(SceneVariable),
    SceneOutput(SceneVariable),
    SceneStep(SceneStepRequest),
    Context { step_id: u64, scene_id: u64 },
}

impl Call {
    /// Operation name used for failure injection
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateSpace(_) => "create_space",
            Self::CreateSceneSet(_) => "create_scene_set",
            Self::CreateScene(_) => "create_scene",
            Self::GetScene(_) => "get_scene",
            Self::GetSceneSet(_) => "get_scene_set",
            Self::GetApiOperation(_) => "get_api_operation",
            Self::ListApis { .. } => "list_api_index_ids",
            Self::FindApi { .. } => "find_api_index_id",
            Self::SceneInput(_) => "create_scene_input",
            Self::SceneOutput(_) => "create_scene_output",
            Self::SceneStep(_) => "create_scene_step",
            Self::Context { .. } => "step_context",
        }
    }
}

/// Recording fake for [`SceneStore`], [`ApiCatalog`] and [`StepContextSource`]
///
/// Ids handed out for created entities start at 1000 and never repeat.
#[derive(Debug)]
pub struct RecordingPlatform {
    next_id: AtomicU64,
    scenes: DashMap<u64, SceneInfo>,
    scene_sets: DashMap<u64, SceneSetInfo>,
    apis: DashMap<u64, ApiOperation>,
    assets: DashMap<String, Vec<u64>>,
    scene_inputs: DashMap<u64, Vec<ContextVariable>>,
    failures: DashMap<&'static str, PlatformError>,
    failing_steps: DashMap<u64, PlatformError>,
    calls: Mutex<Vec<Call>>,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            scenes: DashMap::new(),
            scene_sets: DashMap::new(),
            apis: DashMap::new(),
            assets: DashMap::new(),
            scene_inputs: DashMap::new(),
            failures: DashMap::new(),
            failing_steps: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Existing scene with its parents
    #[must_use]
    pub fn with_scene(self, scene_id: u64, space_id: u64, scene_set_id: u64) -> Self {
        self.scenes.insert(
            scene_id,
            SceneInfo {
                space_id,
                scene_set_id,
            },
        );
        self.scene_sets
            .entry(scene_set_id)
            .or_insert(SceneSetInfo { space_id });
        self
    }

    /// Existing scene set
    #[must_use]
    pub fn with_scene_set(self, scene_set_id: u64, space_id: u64) -> Self {
        self.scene_sets.insert(scene_set_id, SceneSetInfo { space_id });
        self
    }

    /// API of an asset, listed in insertion order
    #[must_use]
    pub fn with_api(self, asset_id: &str, api_index_id: u64, operation: ApiOperation) -> Self {
        self.apis.insert(api_index_id, operation);
        self.assets
            .entry(asset_id.to_string())
            .or_default()
            .push(api_index_id);
        self
    }

    /// Scene input visible to the context prompt
    #[must_use]
    pub fn with_scene_input(self, scene_id: u64, variable: ContextVariable) -> Self {
        self.scene_inputs.entry(scene_id).or_default().push(variable);
        self
    }

    /// Make every call of an operation fail, e.g. `"create_scene_set"`
    pub fn fail(&self, operation: &'static str, error: PlatformError) {
        self.failures.insert(operation, error);
    }

    /// Make commits of steps for one API operation fail
    pub fn fail_step_for(&self, api_spec_id: u64, error: PlatformError) {
        self.failing_steps.insert(api_spec_id, error);
    }

    /// Snapshot of all calls in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls of one operation
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Committed steps in commit order
    #[must_use]
    pub fn committed_steps(&self) -> Vec<SceneStepRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::SceneStep(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<(), PlatformError> {
        let operation = call.operation();
        self.calls.lock().push(call);
        match self.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneStore for RecordingPlatform {
    async fn create_space(&self, request: &CreateSpace) -> Result<u64, PlatformError> {
        self.record(Call::CreateSpace(request.clone()))?;
        Ok(self.allocate())
    }

    async fn create_scene_set(&self, request: &CreateSceneSet) -> Result<u64, PlatformError> {
        self.record(Call::CreateSceneSet(request.clone()))?;
        let id = self.allocate();
        self.scene_sets.insert(
            id,
            SceneSetInfo {
                space_id: request.space_id,
            },
        );
        Ok(id)
    }

    async fn create_scene(&self, request: &CreateScene) -> Result<u64, PlatformError> {
        self.record(Call::CreateScene(request.clone()))?;
        let id = self.allocate();
        self.scenes.insert(
            id,
            SceneInfo {
                space_id: request.space_id,
                scene_set_id: request.scene_set_id,
            },
        );
        Ok(id)
    }

    async fn get_scene(&self, scene_id: u64, _user_id: &str) -> Result<SceneInfo, PlatformError> {
        self.record(Call::GetScene(scene_id))?;
        self.scenes
            .get(&scene_id)
            .map(|s| *s)
            .ok_or_else(|| PlatformError::not_found("scene", scene_id))
    }

    async fn get_scene_set(
        &self,
        scene_set_id: u64,
        _user_id: &str,
    ) -> Result<SceneSetInfo, PlatformError> {
        self.record(Call::GetSceneSet(scene_set_id))?;
        self.scene_sets
            .get(&scene_set_id)
            .map(|s| *s)
            .ok_or_else(|| PlatformError::not_found("scene set", scene_set_id))
    }

    async fn create_scene_input(&self, variable: &SceneVariable) -> Result<u64, PlatformError> {
        self.record(Call::SceneInput(variable.clone()))?;
        Ok(self.allocate())
    }

    async fn create_scene_output(&self, variable: &SceneVariable) -> Result<u64, PlatformError> {
        self.record(Call::SceneOutput(variable.clone()))?;
        Ok(self.allocate())
    }

    async fn create_scene_step(&self, request: &SceneStepRequest) -> Result<u64, PlatformError> {
        self.record(Call::SceneStep(request.clone()))?;
        if let Some(error) = self.failing_steps.get(&request.api_spec_id) {
            return Err(error.clone());
        }
        Ok(self.allocate())
    }
}

#[async_trait]
impl ApiCatalog for RecordingPlatform {
    async fn get_api_operation(
        &self,
        _org_id: u64,
        _user_id: &str,
        api_index_id: u64,
    ) -> Result<ApiOperation, PlatformError> {
        self.record(Call::GetApiOperation(api_index_id))?;
        self.apis
            .get(&api_index_id)
            .map(|op| op.clone())
            .ok_or_else(|| PlatformError::not_found("api index", api_index_id))
    }

    async fn list_api_index_ids(
        &self,
        _org_id: u64,
        _user_id: &str,
        asset_id: &str,
        version_id: u64,
    ) -> Result<Vec<u64>, PlatformError> {
        self.record(Call::ListApis {
            asset_id: asset_id.to_string(),
            version_id,
        })?;
        Ok(self
            .assets
            .get(asset_id)
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }

    async fn find_api_index_id(
        &self,
        _org_id: u64,
        _user_id: &str,
        asset_id: &str,
        _version_id: u64,
        operation_id: &str,
    ) -> Result<u64, PlatformError> {
        self.record(Call::FindApi {
            asset_id: asset_id.to_string(),
            operation_id: operation_id.to_string(),
        })?;
        let ids = self
            .assets
            .get(asset_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.into_iter()
            .find(|id| {
                self.apis
                    .get(id)
                    .is_some_and(|op| op.operation_id == operation_id)
            })
            .ok_or_else(|| PlatformError::not_found("operation", operation_id))
    }
}

#[async_trait]
impl StepContextSource for RecordingPlatform {
    async fn scene_inputs(
        &self,
        scene_id: u64,
        _user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError> {
        self.record(Call::Context {
            step_id: 0,
            scene_id,
        })?;
        Ok(self
            .scene_inputs
            .get(&scene_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn preceding_step_outputs(
        &self,
        _step_id: u64,
        _scene_id: u64,
        _user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError> {
        Ok(Vec::new())
    }

    async fn preceding_config_sheet_outputs(
        &self,
        _step_id: u64,
        _scene_id: u64,
        _user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError> {
        Ok(Vec::new())
    }

    async fn global_config_outputs(
        &self,
        _scene_id: u64,
        _user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError> {
        Ok(Vec::new())
    }

    async fn mock_inputs(
        &self,
        _scene_id: u64,
        _user_id: &str,
    ) -> Result<Vec<ContextVariable>, PlatformError> {
        Ok(Vec::new())
    }
}

/// Collect a map of operation name to call count
#[must_use]
pub fn call_histogram(calls: &[Call]) -> HashMap<&'static str, usize> {
    let mut histogram = HashMap::new();
    for call in calls {
        *histogram.entry(call.operation()).or_insert(0) += 1;
    }
    histogram
}
