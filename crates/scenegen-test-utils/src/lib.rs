//! Testing utilities for the scenegen workspace
//!
//! Shared fakes, fixtures, and builders.

#![allow(missing_docs)]

pub mod caller;
pub mod platform;

pub use caller::{ScriptedCaller, SAMPLE_ARGUMENTS};
pub use platform::{call_histogram, Call, RecordingPlatform};

use scenegen_core::{
    ApiOperation, ApiParameter, ApiResponse, ApplyRequest, Background, FunctionParams,
    GeneratorConfig, Orchestrator, Requirement, SceneStepFunction,
};
use std::sync::Arc;

pub const ORG_ID: u64 = 1;
pub const PROJECT_ID: u64 = 77;
pub const USER_ID: &str = "u-1";

/// API operation with one query parameter, one header and a 200 response
pub fn api_operation(id: u64, method: &str, path: &str) -> ApiOperation {
    ApiOperation {
        id,
        operation_id: format!("op{id}"),
        method: method.to_string(),
        path: path.to_string(),
        description: format!("{method} {path}"),
        parameters: vec![ApiParameter {
            name: "limit".into(),
            location: "query".into(),
            required: false,
            description: "page size".into(),
        }],
        headers: vec![ApiParameter {
            name: "Authorization".into(),
            location: "header".into(),
            required: true,
            description: String::new(),
        }],
        responses: vec![ApiResponse {
            status_code: "200".into(),
            description: "ok".into(),
        }],
    }
}

/// Envelope for the scene generation function
pub fn batch(requirements: Vec<Requirement>) -> ApplyRequest {
    ApplyRequest {
        function_name: SceneStepFunction::NAME.to_string(),
        background: Background {
            org_id: ORG_ID,
            project_id: PROJECT_ID,
            user_id: USER_ID.to_string(),
        },
        function_params: FunctionParams { requirements },
        need_adjust: false,
    }
}

/// Orchestrator wired to one recording platform
pub fn orchestrator(
    platform: &Arc<RecordingPlatform>,
    caller: &Arc<ScriptedCaller>,
    config: GeneratorConfig,
) -> Orchestrator {
    Orchestrator::new(
        config,
        platform.clone(),
        platform.clone(),
        platform.clone(),
        caller.clone(),
    )
    .expect("valid test configuration")
}
