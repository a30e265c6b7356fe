//! Batch orchestrator
//!
//! Entry point of the engine. One `apply` call:
//! 1. Validates the batch (no side effect before this passes)
//! 2. Resolves every requirement's hierarchy, in input order
//! 3. Expands API selectors and registers scene variables
//! 4. Fans out one generation unit per (requirement, API) pair
//! 5. Aggregates results according to the failure policy

use crate::cache::ApiDetailCache;
use crate::config::{FailurePolicy, GeneratorConfig};
use crate::context::ApplyContext;
use crate::context_prompt::ContextPromptBuilder;
use crate::dispatch::{commit_turns, CommitTurn};
use crate::error::SceneGenError;
use crate::function::SceneStepFunction;
use crate::generation::GenerationTask;
use crate::platform::{ApiCatalog, SceneStore, StepContextSource};
use crate::resolver::HierarchyResolver;
use crate::types::{
    ApiSelector, ApplyRequest, ApplyResponse, GenerationInput, ResolvedHierarchy, ResponseError,
    SceneStepRequest, StepResult, UnitFailure,
};
use crate::variables::{PlaceholderValues, VariableRegistrar, VariableValuePolicy};
use futures::stream::{self, StreamExt};
use scenegen_llm::{FunctionCaller, FunctionDefinition};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One dispatched unit of work
#[derive(Debug, Clone)]
enum Unit {
    Generate(GenerationInput),
    Replay {
        index: usize,
        request: SceneStepRequest,
        hierarchy: ResolvedHierarchy,
    },
}

impl Unit {
    fn scene_id(&self) -> u64 {
        match self {
            Self::Generate(input) => input.hierarchy.ids.scene_id,
            Self::Replay { request, .. } => request.scene_id,
        }
    }
}

/// The scene-step generation engine
#[derive(Clone)]
pub struct Orchestrator {
    config: GeneratorConfig,
    scenes: Arc<dyn SceneStore>,
    catalog: Arc<dyn ApiCatalog>,
    context_source: Arc<dyn StepContextSource>,
    caller: Arc<dyn FunctionCaller>,
    values: Arc<dyn VariableValuePolicy>,
    function: Arc<FunctionDefinition>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("function", &self.function.name)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator over its collaborators
    ///
    /// # Errors
    /// `SceneGenError::Config` if the configuration is invalid
    pub fn new(
        config: GeneratorConfig,
        scenes: Arc<dyn SceneStore>,
        catalog: Arc<dyn ApiCatalog>,
        context_source: Arc<dyn StepContextSource>,
        caller: Arc<dyn FunctionCaller>,
    ) -> Result<Self, SceneGenError> {
        config.validate()?;
        Ok(Self {
            config,
            scenes,
            catalog,
            context_source,
            caller,
            values: Arc::new(PlaceholderValues),
            function: Arc::new(SceneStepFunction.definition()?),
        })
    }

    /// With scene variable value policy
    #[inline]
    #[must_use]
    pub fn with_value_policy(mut self, values: Arc<dyn VariableValuePolicy>) -> Self {
        self.values = values;
        self
    }

    /// Get config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Check a batch without touching any collaborator
    ///
    /// # Errors
    /// `SceneGenError::Validation` describing the first problem found
    pub fn validate(request: &ApplyRequest) -> Result<(), SceneGenError> {
        if !request.function_name.is_empty() && request.function_name != SceneStepFunction::NAME {
            return Err(SceneGenError::Validation(format!(
                "function {} is not {}",
                request.function_name,
                SceneStepFunction::NAME
            )));
        }
        let requirements = &request.function_params.requirements;
        if requirements.is_empty() {
            return Err(SceneGenError::Validation(format!(
                "functionParams requirements for {} not set",
                SceneStepFunction::NAME
            )));
        }
        for (index, requirement) in requirements.iter().enumerate() {
            if requirement.apis.asset_id.trim().is_empty() {
                return Err(SceneGenError::Validation(format!(
                    "requirements[{index}].apis.apiAssetId for {} not set",
                    SceneStepFunction::NAME
                )));
            }
        }
        Ok(())
    }

    /// Decode an envelope, apply it and encode the aggregate response
    ///
    /// # Errors
    /// `SceneGenError::Envelope` on undecodable input, otherwise as [`Orchestrator::apply`]
    pub async fn apply_json(
        &self,
        envelope: &[u8],
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, SceneGenError> {
        let request: ApplyRequest = serde_json::from_slice(envelope)?;
        let response = self.apply(request, cancel).await?;
        Ok(serde_json::to_vec(&response)?)
    }

    /// Apply one batch
    ///
    /// # Errors
    /// - `SceneGenError::Validation` before any side effect
    /// - Resolution, lookup and registration errors abort the batch
    /// - The first unit error in dispatch order under [`FailurePolicy::FailFast`]
    /// - `SceneGenError::Cancelled` if `cancel` fires
    pub async fn apply(
        &self,
        mut request: ApplyRequest,
        cancel: CancellationToken,
    ) -> Result<ApplyResponse, SceneGenError> {
        Self::validate(&request)?;
        let ctx = ApplyContext::from_background(&request.background, cancel);
        let requirements = &mut request.function_params.requirements;
        tracing::info!(
            "Applying {} requirements for project {} (need_adjust={})",
            requirements.len(),
            ctx.project_id,
            request.need_adjust
        );

        let result = self.run(&ctx, requirements, request.need_adjust).await;
        match &result {
            Ok(response) => tracing::info!(
                "Batch finished: {} results, success={}",
                response.data.len(),
                response.success
            ),
            Err(e) => tracing::error!("Batch aborted: {}", e),
        }
        result
    }

    async fn run(
        &self,
        ctx: &ApplyContext,
        requirements: &mut [crate::types::Requirement],
        need_adjust: bool,
    ) -> Result<ApplyResponse, SceneGenError> {
        // hierarchy resolution, strictly in input order
        let resolver = HierarchyResolver::new(Arc::clone(&self.scenes), self.config.naming.clone());
        let mut hierarchies = Vec::with_capacity(requirements.len());
        for (index, requirement) in requirements.iter_mut().enumerate() {
            let hierarchy = match &requirement.adjusted {
                // the approved step already names its scene
                Some(adjusted) => {
                    resolver
                        .locate_adjusted(ctx, index, &requirement.target, adjusted)
                        .await?
                }
                None => resolver.resolve(ctx, index, requirement).await?,
            };
            hierarchies.push(hierarchy);
        }

        let details = ApiDetailCache::new(
            Arc::clone(&self.catalog),
            self.config.generation.api_cache_capacity,
        );
        let registrar = VariableRegistrar::new(Arc::clone(&self.scenes), Arc::clone(&self.values));

        // selector expansion and variable registration before any generation
        let mut units = Vec::new();
        for (index, (requirement, hierarchy)) in requirements.iter().zip(hierarchies).enumerate() {
            if let Some(adjusted) = &requirement.adjusted {
                units.push(Unit::Replay {
                    index,
                    request: adjusted.clone(),
                    hierarchy,
                });
                continue;
            }

            let api_index_ids = self.expand_selector(ctx, index, &requirement.apis).await?;
            if api_index_ids.is_empty() {
                tracing::warn!(
                    "requirements[{}]: selector of asset {} matched no API",
                    index,
                    requirement.apis.asset_id
                );
            }
            tracing::debug!("requirements[{}]: api index ids {:?}", index, api_index_ids);

            for api_index_id in api_index_ids {
                let detail = details.get(ctx, api_index_id).await?.map_err(|source| {
                    SceneGenError::ApiLookup {
                        index,
                        api_index_id,
                        source,
                    }
                })?;
                registrar
                    .register(ctx, index, api_index_id, &hierarchy.ids, &detail)
                    .await?;

                units.push(Unit::Generate(GenerationInput {
                    requirement_index: index,
                    asset_id: requirement.apis.asset_id.clone(),
                    version_id: requirement.apis.version_id,
                    api_index_id,
                    api_operation_id: detail.id,
                    api_name: detail.description.clone(),
                    api_method: detail.method.clone(),
                    api_url: detail.path.clone(),
                    user_id: ctx.user_id.clone(),
                    hierarchy: hierarchy.clone(),
                    prompt: requirement.prompt.clone(),
                }));
            }
        }

        let task = GenerationTask::new(
            Arc::clone(&self.caller),
            Arc::clone(&self.scenes),
            ContextPromptBuilder::new(Arc::clone(&self.context_source)),
            details,
            Arc::clone(&self.function),
        );
        let turns = commit_turns(
            units.iter().map(Unit::scene_id),
            self.config.generation.ordered_commits,
        );
        let concurrency = self.config.effective_concurrency();
        tracing::info!(
            "Dispatching {} units ({} in flight)",
            units.len(),
            concurrency
        );

        // under fail-fast the first unit error cancels its siblings, never the caller's token
        let units_ctx = ctx.child();
        let fail_fast = self.config.generation.failure_policy == FailurePolicy::FailFast;

        // buffered keeps dispatch order, the collected Vec is the only writer
        let outcomes: Vec<Result<StepResult, SceneGenError>> = stream::iter(units.into_iter().zip(turns))
            .map(|(unit, turn)| run_unit(&task, &units_ctx, unit, need_adjust, turn, fail_fast))
            .buffered(concurrency)
            .collect()
            .await;

        if ctx.is_cancelled() {
            return Err(SceneGenError::Cancelled);
        }
        self.aggregate(outcomes)
    }

    /// Explicit index ids, then operation ids through the catalog, else the whole asset
    async fn expand_selector(
        &self,
        ctx: &ApplyContext,
        index: usize,
        selector: &ApiSelector,
    ) -> Result<Vec<u64>, SceneGenError> {
        let lookup = |source| SceneGenError::ApiLookup {
            index,
            api_index_id: 0,
            source,
        };

        if selector.selects_all() {
            return ctx
                .guard(self.catalog.list_api_index_ids(
                    ctx.org_id,
                    &ctx.user_id,
                    &selector.asset_id,
                    selector.version_id,
                ))
                .await?
                .map_err(lookup);
        }

        let mut ids = selector.api_index_ids.clone();
        for operation_id in &selector.api_operation_ids {
            let id = ctx
                .guard(self.catalog.find_api_index_id(
                    ctx.org_id,
                    &ctx.user_id,
                    &selector.asset_id,
                    selector.version_id,
                    operation_id,
                ))
                .await?
                .map_err(lookup)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn aggregate(
        &self,
        outcomes: Vec<Result<StepResult, SceneGenError>>,
    ) -> Result<ApplyResponse, SceneGenError> {
        let total = outcomes.len();
        let mut data = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut first_error: Option<SceneGenError> = None;

        for outcome in outcomes {
            match outcome {
                Ok(result) => data.push(result),
                Err(e)
                    if e.is_unit_scoped()
                        && self.config.generation.failure_policy == FailurePolicy::Partial =>
                {
                    tracing::warn!("Unit failed: {}", e);
                    failures.push(UnitFailure {
                        requirement_index: e.requirement_index().unwrap_or_default(),
                        api_index_id: e.api_index_id().unwrap_or_default(),
                        message: e.to_string(),
                    });
                }
                Err(e) => match first_error {
                    None => first_error = Some(e),
                    // a cancelled sibling yields to the error that cancelled it
                    Some(SceneGenError::Cancelled) if !matches!(e, SceneGenError::Cancelled) => {
                        first_error = Some(e);
                    }
                    Some(_) => {}
                },
            }
        }

        if let Some(error) = first_error {
            let committed: Vec<u64> = data.iter().filter_map(|r| r.step_id).collect();
            if !committed.is_empty() {
                tracing::warn!(
                    "Batch failed after committing steps {:?}: {}",
                    committed,
                    error
                );
            }
            return Err(error);
        }

        if failures.is_empty() {
            return Ok(ApplyResponse {
                success: true,
                data,
                err: None,
            });
        }
        Ok(ApplyResponse {
            success: false,
            data,
            err: Some(ResponseError {
                msg: format!("{} of {} units failed", failures.len(), total),
                failures,
            }),
        })
    }
}

async fn run_unit(
    task: &GenerationTask,
    ctx: &ApplyContext,
    unit: Unit,
    need_adjust: bool,
    turn: CommitTurn,
    fail_fast: bool,
) -> Result<StepResult, SceneGenError> {
    let outcome = match unit {
        Unit::Generate(input) => task.generate(ctx, &input, need_adjust, turn).await,
        Unit::Replay {
            index,
            request,
            hierarchy,
        } => task.replay(ctx, index, &request, &hierarchy, turn).await,
    };
    if fail_fast {
        if let Err(e) = &outcome {
            if e.is_unit_scoped() {
                tracing::warn!("Cancelling remaining units: {}", e);
                ctx.cancel();
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MockApiCatalog, MockSceneStore, MockStepContextSource};
    use crate::types::{Background, FunctionParams, Requirement};
    use scenegen_llm::MockFunctionCaller;

    fn orchestrator(catalog: MockApiCatalog) -> Orchestrator {
        Orchestrator::new(
            GeneratorConfig::default(),
            Arc::new(MockSceneStore::new()),
            Arc::new(catalog),
            Arc::new(MockStepContextSource::new()),
            Arc::new(MockFunctionCaller::new()),
        )
        .unwrap()
    }

    fn batch(requirements: Vec<Requirement>) -> ApplyRequest {
        ApplyRequest {
            function_name: SceneStepFunction::NAME.to_string(),
            background: Background {
                org_id: 1,
                project_id: 2,
                user_id: "u-1".into(),
            },
            function_params: FunctionParams { requirements },
            need_adjust: true,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(Orchestrator::validate(&batch(vec![Requirement::new("a")])).is_ok());

        let empty = Orchestrator::validate(&batch(Vec::new())).unwrap_err();
        assert!(matches!(empty, SceneGenError::Validation(_)));

        let missing = Orchestrator::validate(&batch(vec![Requirement::new("a"), Requirement::new("")]))
            .unwrap_err();
        assert!(missing.to_string().contains("requirements[1]"));

        let mut wrong = batch(vec![Requirement::new("a")]);
        wrong.function_name = "create-test-case".into();
        assert!(matches!(
            Orchestrator::validate(&wrong),
            Err(SceneGenError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn operation_ids_follow_explicit_ids_without_duplicates() {
        let mut catalog = MockApiCatalog::new();
        catalog
            .expect_find_api_index_id()
            .returning(|_, _, _, _, op| Ok(if op == "getPet" { 12 } else { 13 }));
        let orchestrator = orchestrator(catalog);
        let selector = ApiSelector {
            asset_id: "pets".into(),
            version_id: 1,
            api_index_ids: vec![12, 11],
            api_operation_ids: vec!["getPet".into(), "deletePet".into()],
        };

        let ids = orchestrator
            .expand_selector(&ApplyContext::new(1, 2, "u-1"), 0, &selector)
            .await
            .unwrap();
        assert_eq!(ids, vec![12, 11, 13]);
    }

    #[tokio::test]
    async fn empty_selector_lists_the_asset() {
        let mut catalog = MockApiCatalog::new();
        catalog
            .expect_list_api_index_ids()
            .withf(|org, _, asset, version| *org == 1 && asset == "pets" && *version == 3)
            .times(1)
            .returning(|_, _, _, _| Ok(vec![5, 6, 7]));
        let orchestrator = orchestrator(catalog);
        let selector = ApiSelector {
            asset_id: "pets".into(),
            version_id: 3,
            ..ApiSelector::default()
        };

        let ids = orchestrator
            .expand_selector(&ApplyContext::new(1, 2, "u-1"), 0, &selector)
            .await
            .unwrap();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[test]
    fn partial_policy_lists_unit_failures() {
        let orchestrator = orchestrator(MockApiCatalog::new());
        let mut partial = orchestrator.clone();
        partial.config = partial.config.with_failure_policy(FailurePolicy::Partial);

        let failure = || {
            Err(SceneGenError::Commit {
                index: 1,
                api_index_id: 9,
                source: crate::error::PlatformError::Rejected("locked".into()),
            })
        };

        let response = partial
            .aggregate(vec![Ok(StepResult::default()), failure()])
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.data.len(), 1);
        let err = response.err.unwrap();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].api_index_id, 9);
        assert_eq!(err.failures[0].requirement_index, 1);

        let fail_fast = orchestrator.aggregate(vec![Ok(StepResult::default()), failure()]);
        assert!(matches!(fail_fast, Err(SceneGenError::Commit { .. })));
    }

    #[test]
    fn fail_fast_reports_the_error_that_cancelled_siblings() {
        let orchestrator = orchestrator(MockApiCatalog::new());
        let generation = || SceneGenError::Generation {
            index: 0,
            api_index_id: 12,
            reason: crate::error::GenerationFailure::Provider(scenegen_llm::LlmError::Request {
                status: 500,
                message: "down".into(),
            }),
        };

        // a sibling dispatched earlier was still in flight when it got cancelled
        let result = orchestrator.aggregate(vec![
            Ok(StepResult::default()),
            Err(SceneGenError::Cancelled),
            Err(generation()),
            Err(SceneGenError::Cancelled),
        ]);
        assert!(matches!(
            result,
            Err(SceneGenError::Generation { api_index_id: 12, .. })
        ));

        let result = orchestrator.aggregate(vec![
            Err(SceneGenError::Cancelled),
            Err(SceneGenError::Cancelled),
        ]);
        assert!(matches!(result, Err(SceneGenError::Cancelled)));
    }
}
