//! Scenegen Core - autotest scene-step generation engine
//!
//! Turns requirements (an API selection plus a possibly partial target
//! hierarchy) into scene steps:
//! - Resolves space, scene set and scene through an 8-way strategy table
//! - Registers scene inputs and outputs derived from each API
//! - Generates one step per API with a function-calling model, concurrently
//! - Stages steps for human review or commits them in selector order
//!
//! # Example
//!
//! ```rust,ignore
//! use scenegen_core::{GeneratorConfig, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(scenes, catalog, context_source, caller) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(
//!     GeneratorConfig::default(),
//!     scenes,
//!     catalog,
//!     context_source,
//!     caller,
//! )?;
//!
//! let response = orchestrator
//!     .apply_json(br#"{"functionName": "create-autotest-scene", ...}"#, CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod cache;
pub mod config;
pub mod context;
pub mod context_prompt;
pub mod dispatch;
pub mod error;
pub mod function;
pub mod generation;
pub mod orchestrator;
pub mod platform;
pub mod resolver;
pub mod step;
pub mod types;
pub mod variables;

// Re-exports for convenience
pub use cache::ApiDetailCache;
pub use config::{DispatchMode, FailurePolicy, GenerationSettings, GeneratorConfig, LlmSettings, NamingSettings};
pub use context::ApplyContext;
pub use context_prompt::{ContextPromptBuilder, StepVariables};
pub use dispatch::{commit_turns, CommitTurn};
pub use error::{Cancelled, GenerationFailure, PlatformError, SceneGenError};
pub use function::SceneStepFunction;
pub use generation::GenerationTask;
pub use orchestrator::Orchestrator;
pub use platform::{
    ApiCatalog, ApiOperation, ApiParameter, ApiResponse, ContextVariable, CreateScene,
    CreateSceneSet, CreateSpace, SceneInfo, SceneSetInfo, SceneStore, SceneVariable,
    StepContextSource,
};
pub use resolver::{HierarchyResolver, PlannedCall, ResolutionStrategy};
pub use step::{ApiAssert, ApiBody, ApiInfo, ApiOutParam, ApiParam, ApiSpec};
pub use types::{
    ApiSelector, ApplyRequest, ApplyResponse, Background, FunctionParams, GenerationInput,
    Requirement, ResolvedHierarchy, ResponseError, SceneStepRequest, StepResult, TargetHierarchy,
    UnitFailure,
};
pub use variables::{PlaceholderValues, VariableRegistrar, VariableValue, VariableValuePolicy};

#[cfg(any(test, feature = "mock"))]
pub use platform::{MockApiCatalog, MockSceneStore, MockStepContextSource};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Scenegen Core
    pub use crate::{
        ApiCatalog, ApplyRequest, ApplyResponse, FailurePolicy, GeneratorConfig, Orchestrator,
        Requirement, SceneGenError, SceneStore, StepContextSource, StepResult, TargetHierarchy,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
