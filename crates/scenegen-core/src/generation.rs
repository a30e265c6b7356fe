//! Per-API generation task
//!
//! One task per (requirement, API) unit. Two mutually exclusive paths:
//! - Generation: prompt the model, decode the step specification and build a
//!   scene-step write request
//! - Replay: commit a human-adjusted write request verbatim
//!
//! A generated step is either staged (returned for review) or committed,
//! never both.

use crate::cache::ApiDetailCache;
use crate::context::ApplyContext;
use crate::context_prompt::ContextPromptBuilder;
use crate::dispatch::CommitTurn;
use crate::error::{GenerationFailure, SceneGenError};
use crate::function::SceneStepFunction;
use crate::platform::SceneStore;
use crate::step::{ApiInfo, ApiSpec};
use crate::types::{GenerationInput, ResolvedHierarchy, SceneStepRequest, StepResult};
use scenegen_llm::{CompletionOptions, FunctionCaller, FunctionDefinition};
use std::sync::Arc;

/// Step id addressed by the context prompt: append at the end of the scene
const APPEND_STEP_ID: u64 = 0;

/// Generates and commits scene steps
#[derive(Clone)]
pub struct GenerationTask {
    caller: Arc<dyn FunctionCaller>,
    store: Arc<dyn SceneStore>,
    prompts: ContextPromptBuilder,
    details: ApiDetailCache,
    function: Arc<FunctionDefinition>,
    options: CompletionOptions,
}

impl std::fmt::Debug for GenerationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationTask")
            .field("function", &self.function.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GenerationTask {
    /// Create task
    #[must_use]
    pub fn new(
        caller: Arc<dyn FunctionCaller>,
        store: Arc<dyn SceneStore>,
        prompts: ContextPromptBuilder,
        details: ApiDetailCache,
        function: Arc<FunctionDefinition>,
    ) -> Self {
        Self {
            caller,
            store,
            prompts,
            details,
            function,
            options: SceneStepFunction.completion_options(),
        }
    }

    /// With completion options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Generate one step, then stage or commit it
    ///
    /// # Errors
    /// - `SceneGenError::Generation` if the model call or decoding fails
    /// - `SceneGenError::Commit` if persisting fails
    /// - `SceneGenError::Cancelled` if the batch was cancelled
    pub async fn generate(
        &self,
        ctx: &ApplyContext,
        input: &GenerationInput,
        need_adjust: bool,
        turn: CommitTurn,
    ) -> Result<StepResult, SceneGenError> {
        let request = self.build_request(ctx, input).await?;
        let staged = StepResult::staged(request, &input.hierarchy);

        if need_adjust {
            tracing::debug!(
                "requirements[{}]: staged step {} for review",
                input.requirement_index,
                staged.request.name
            );
            return Ok(staged);
        }

        let step_id = self
            .commit(ctx, input.requirement_index, input.api_index_id, &staged.request, turn)
            .await?;
        Ok(staged.committed(step_id))
    }

    /// Commit a human-adjusted request verbatim
    ///
    /// # Errors
    /// - `SceneGenError::Commit` if persisting fails
    /// - `SceneGenError::Cancelled` if the batch was cancelled
    pub async fn replay(
        &self,
        ctx: &ApplyContext,
        index: usize,
        request: &SceneStepRequest,
        hierarchy: &ResolvedHierarchy,
        turn: CommitTurn,
    ) -> Result<StepResult, SceneGenError> {
        let step_id = self
            .commit(ctx, index, request.api_spec_id, request, turn)
            .await?;
        tracing::info!(
            "requirements[{}]: replayed adjusted step {} as {}",
            index,
            request.name,
            step_id
        );
        Ok(StepResult::staged(request.clone(), hierarchy).committed(step_id))
    }

    async fn build_request(
        &self,
        ctx: &ApplyContext,
        input: &GenerationInput,
    ) -> Result<SceneStepRequest, SceneGenError> {
        let fail = |reason: GenerationFailure| SceneGenError::Generation {
            index: input.requirement_index,
            api_index_id: input.api_index_id,
            reason,
        };
        let scene_id = input.hierarchy.ids.scene_id;

        let detail = self
            .details
            .get(ctx, input.api_index_id)
            .await?
            .map_err(|e| fail(GenerationFailure::ApiDetail(e)))?;
        let detail_json =
            serde_json::to_string(&*detail).map_err(|e| fail(GenerationFailure::Encode(e)))?;

        let context_prompt = self
            .prompts
            .build(ctx, APPEND_STEP_ID, scene_id)
            .await?
            .map_err(|e| fail(GenerationFailure::Context(e)))?;

        let messages = SceneStepFunction.messages(&detail_json, &context_prompt, &input.prompt);
        tracing::debug!(
            "requirements[{}]: calling {} for {} {} with {} messages",
            input.requirement_index,
            self.function.name,
            input.api_method,
            input.api_url,
            messages.len()
        );

        let call = ctx
            .guard(self.caller.call_function(&messages, &self.function, &self.options))
            .await?
            .map_err(|e| fail(GenerationFailure::Provider(e)))?;
        tracing::debug!(
            "requirements[{}]: function arguments for api index {}: {}",
            input.requirement_index,
            input.api_index_id,
            call.arguments
        );

        let mut api_info: ApiInfo = serde_json::from_str(&call.arguments)
            .map_err(|e| fail(GenerationFailure::MalformedArguments(e)))?;
        api_info.overlay_summary(&input.api_name, &input.api_method, &input.api_url);
        api_info.prettify_body();

        let name = api_info.name.clone();
        let value = serde_json::to_string(&ApiSpec::new(api_info))
            .map_err(|e| fail(GenerationFailure::Encode(e)))?;

        Ok(SceneStepRequest {
            space_id: input.hierarchy.ids.space_id,
            scene_id,
            value,
            user_id: input.user_id.clone(),
            api_spec_id: input.api_operation_id,
            name,
        })
    }

    async fn commit(
        &self,
        ctx: &ApplyContext,
        index: usize,
        api_index_id: u64,
        request: &SceneStepRequest,
        mut turn: CommitTurn,
    ) -> Result<u64, SceneGenError> {
        ctx.guard(turn.wait()).await?;
        let step_id = ctx
            .guard(self.store.create_scene_step(request))
            .await?
            .map_err(|source| SceneGenError::Commit {
                index,
                api_index_id,
                source,
            })?;
        turn.pass();
        tracing::debug!(
            "requirements[{}]: committed step {} to scene {}",
            index,
            step_id,
            request.scene_id
        );
        Ok(step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platform::{ApiOperation, MockApiCatalog, MockSceneStore, MockStepContextSource};
    use crate::types::TargetHierarchy;
    use scenegen_llm::{FunctionCall, LlmError, MockFunctionCaller};

    const ARGUMENTS: &str = r#"{
        "name": "model picked name",
        "method": "DELETE",
        "url": "/elsewhere",
        "headers": [],
        "params": [{"key": "limit", "value": "10"}],
        "body": {"type": "application/json", "content": "{\"name\":\"rex\"}"},
        "outParams": [{"key": "status", "source": "status", "expression": "status"}],
        "asserts": [{"arg": "status", "operator": "=", "value": "200"}]
    }"#;

    fn input() -> GenerationInput {
        GenerationInput {
            requirement_index: 2,
            asset_id: "pets".into(),
            version_id: 1,
            api_index_id: 11,
            api_operation_id: 501,
            api_name: "create pet".into(),
            api_method: "POST".into(),
            api_url: "/pets".into(),
            user_id: "u-1".into(),
            hierarchy: ResolvedHierarchy {
                ids: TargetHierarchy::new(10, 20, 30),
                scene_name: "AI_Generated_Scene_pets".into(),
                ..ResolvedHierarchy::default()
            },
            prompt: String::new(),
        }
    }

    fn catalog() -> MockApiCatalog {
        let mut catalog = MockApiCatalog::new();
        catalog.expect_get_api_operation().returning(|_, _, id| {
            Ok(ApiOperation {
                id: 501,
                method: "POST".into(),
                path: format!("/pets?index={id}"),
                description: "create pet".into(),
                ..ApiOperation::default()
            })
        });
        catalog
    }

    fn context_source() -> MockStepContextSource {
        let mut source = MockStepContextSource::new();
        source.expect_scene_inputs().returning(|_, _| Ok(Vec::new()));
        source
            .expect_preceding_step_outputs()
            .returning(|_, _, _| Ok(Vec::new()));
        source
            .expect_preceding_config_sheet_outputs()
            .returning(|_, _, _| Ok(Vec::new()));
        source
            .expect_global_config_outputs()
            .returning(|_, _| Ok(Vec::new()));
        source.expect_mock_inputs().returning(|_, _| Ok(Vec::new()));
        source
    }

    fn caller_returning(arguments: &'static str) -> MockFunctionCaller {
        let mut caller = MockFunctionCaller::new();
        caller
            .expect_call_function()
            .withf(|messages, function, options| {
                messages.len() == 4
                    && messages[1].content.contains("/pets?index=11")
                    && function.name == "create-autotest-scene"
                    && options.model == "gpt-35-turbo-16k"
            })
            .times(1)
            .returning(move |_, _, _| {
                Ok(FunctionCall {
                    name: "create-autotest-scene".into(),
                    arguments: arguments.to_string(),
                })
            });
        caller
    }

    fn task(caller: MockFunctionCaller, store: MockSceneStore) -> GenerationTask {
        GenerationTask::new(
            Arc::new(caller),
            Arc::new(store),
            ContextPromptBuilder::new(Arc::new(context_source())),
            ApiDetailCache::new(Arc::new(catalog()), 16),
            Arc::new(SceneStepFunction.definition().unwrap()),
        )
    }

    fn ctx() -> ApplyContext {
        ApplyContext::new(1, 77, "u-1")
    }

    #[tokio::test]
    async fn need_adjust_stages_without_commit() {
        // no create_scene_step expectation: a commit would panic
        let task = task(caller_returning(ARGUMENTS), MockSceneStore::new());

        let result = task
            .generate(&ctx(), &input(), true, CommitTurn::free())
            .await
            .unwrap();

        assert!(!result.is_committed());
        assert_eq!(result.scene_id, 30);
        assert_eq!(result.scene_name, "AI_Generated_Scene_pets");
        assert_eq!(result.request.api_spec_id, 501);
        assert_eq!(result.request.name, "create pet");
        assert_eq!(result.request.user_id, "u-1");

        let spec: ApiSpec = serde_json::from_str(&result.request.value).unwrap();
        assert_eq!(spec.api_info.method, "POST");
        assert_eq!(spec.api_info.url, "/pets");
        assert_eq!(spec.api_info.params[0].key, "limit");
        assert!(spec.api_info.body.content.as_str().unwrap().contains("\n  \"name\": \"rex\""));
        assert!(spec.loop_strategy.is_none());
    }

    #[tokio::test]
    async fn commit_happens_once_with_returned_id() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_scene_step()
            .withf(|r| r.space_id == 10 && r.scene_id == 30 && r.api_spec_id == 501)
            .times(1)
            .returning(|_| Ok(9001));
        let task = task(caller_returning(ARGUMENTS), store);

        let result = task
            .generate(&ctx(), &input(), false, CommitTurn::free())
            .await
            .unwrap();

        assert_eq!(result.step_id, Some(9001));
    }

    #[tokio::test]
    async fn malformed_arguments_fail_the_unit() {
        let task = task(caller_returning("{\"headers\": 5"), MockSceneStore::new());

        let err = task
            .generate(&ctx(), &input(), false, CommitTurn::free())
            .await
            .unwrap_err();

        match err {
            SceneGenError::Generation {
                index,
                api_index_id,
                reason: GenerationFailure::MalformedArguments(_),
            } => assert_eq!((index, api_index_id), (2, 11)),
            other => panic!("expected MalformedArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_failure_is_a_generation_error() {
        let mut caller = MockFunctionCaller::new();
        caller
            .expect_call_function()
            .times(1)
            .returning(|_, _, _| Err(LlmError::NoFunctionCall("create-autotest-scene".into())));
        let task = task(caller, MockSceneStore::new());

        let err = task
            .generate(&ctx(), &input(), true, CommitTurn::free())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SceneGenError::Generation {
                reason: GenerationFailure::Provider(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn commit_failure_names_unit() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_scene_step()
            .times(1)
            .returning(|_| Err(PlatformError::Rejected("scene locked".into())));
        let task = task(caller_returning(ARGUMENTS), store);

        let err = task
            .generate(&ctx(), &input(), false, CommitTurn::free())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SceneGenError::Commit {
                index: 2,
                api_index_id: 11,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn replay_commits_verbatim_without_model() {
        let adjusted = SceneStepRequest {
            space_id: 10,
            scene_id: 30,
            value: "{\"apiSpec\":{},\"loop\":null}".into(),
            user_id: "u-1".into(),
            api_spec_id: 501,
            name: "edited by reviewer".into(),
        };
        let expected = adjusted.clone();
        let mut store = MockSceneStore::new();
        store
            .expect_create_scene_step()
            .withf(move |r| *r == expected)
            .times(1)
            .returning(|_| Ok(77));
        // no call_function expectation: a model call would panic
        let task = task(MockFunctionCaller::new(), store);

        let result = task
            .replay(&ctx(), 0, &adjusted, &input().hierarchy, CommitTurn::free())
            .await
            .unwrap();

        assert_eq!(result.step_id, Some(77));
        assert_eq!(result.request, adjusted);
    }
}
