//! Scene variable registration
//!
//! Before steps are generated, every selected API contributes scene
//! variables to its target scene:
//! - one input per declared parameter
//! - one input per declared header
//! - one `statusCode` output per declared response
//!
//! Values come from a [`VariableValuePolicy`].

use crate::context::ApplyContext;
use crate::error::{PlatformError, SceneGenError};
use crate::platform::{ApiOperation, ApiParameter, ApiResponse, SceneStore, SceneVariable};
use crate::types::TargetHierarchy;
use std::sync::Arc;

/// Name of the output registered per response
pub const STATUS_CODE_OUTPUT: &str = "statusCode";

/// Value and temporary (debug) value of a scene variable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableValue {
    /// Value
    pub value: String,
    /// Temporary value
    pub temp: String,
}

impl VariableValue {
    /// Same text for value and temp
    #[inline]
    #[must_use]
    pub fn both(text: impl Into<String>) -> Self {
        let value = text.into();
        Self {
            temp: value.clone(),
            value,
        }
    }
}

/// Derives the values of registered scene variables
pub trait VariableValuePolicy: Send + Sync {
    /// Value of the input created for a parameter
    fn parameter_input(&self, api: &ApiOperation, parameter: &ApiParameter) -> VariableValue;

    /// Value of the input created for a header
    fn header_input(&self, api: &ApiOperation, header: &ApiParameter) -> VariableValue;

    /// Value of the output created for a response
    fn response_output(&self, api: &ApiOperation, response: &ApiResponse) -> VariableValue;
}

/// Empty inputs; outputs carry the status code
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderValues;

impl VariableValuePolicy for PlaceholderValues {
    fn parameter_input(&self, _: &ApiOperation, _: &ApiParameter) -> VariableValue {
        VariableValue::default()
    }

    fn header_input(&self, _: &ApiOperation, _: &ApiParameter) -> VariableValue {
        VariableValue::default()
    }

    fn response_output(&self, _: &ApiOperation, response: &ApiResponse) -> VariableValue {
        VariableValue::both(response.status_code.clone())
    }
}

/// Registers scene inputs and outputs derived from API details
#[derive(Clone)]
pub struct VariableRegistrar {
    store: Arc<dyn SceneStore>,
    policy: Arc<dyn VariableValuePolicy>,
}

impl std::fmt::Debug for VariableRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRegistrar").finish_non_exhaustive()
    }
}

impl VariableRegistrar {
    /// Create registrar
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn SceneStore>, policy: Arc<dyn VariableValuePolicy>) -> Self {
        Self { store, policy }
    }

    /// Register the variables of one API in its target scene
    ///
    /// Returns the number of registered variables.
    ///
    /// # Errors
    /// - `SceneGenError::VariableRegistration` naming API index, method and path
    /// - `SceneGenError::Cancelled` if the batch was cancelled
    pub async fn register(
        &self,
        ctx: &ApplyContext,
        index: usize,
        api_index_id: u64,
        target: &TargetHierarchy,
        api: &ApiOperation,
    ) -> Result<usize, SceneGenError> {
        let variable = |name: &str, value: VariableValue| SceneVariable {
            name: name.to_string(),
            description: String::new(),
            value: value.value,
            temp: value.temp,
            space_id: target.space_id,
            scene_set_id: target.scene_set_id,
            scene_id: target.scene_id,
            user_id: ctx.user_id.clone(),
        };
        let fail = |source: PlatformError| SceneGenError::VariableRegistration {
            index,
            api_index_id,
            method: api.method.clone(),
            path: api.path.clone(),
            source,
        };

        let mut count = 0;
        for parameter in &api.parameters {
            let input = variable(&parameter.name, self.policy.parameter_input(api, parameter));
            ctx.guard(self.store.create_scene_input(&input))
                .await?
                .map_err(fail)?;
            count += 1;
        }
        for header in &api.headers {
            let input = variable(&header.name, self.policy.header_input(api, header));
            ctx.guard(self.store.create_scene_input(&input))
                .await?
                .map_err(fail)?;
            count += 1;
        }
        for response in &api.responses {
            let output = variable(STATUS_CODE_OUTPUT, self.policy.response_output(api, response));
            ctx.guard(self.store.create_scene_output(&output))
                .await?
                .map_err(fail)?;
            count += 1;
        }

        tracing::debug!(
            "requirements[{}]: registered {} scene variables for {} {}",
            index,
            count,
            api.method,
            api.path
        );
        Ok(count)
    }
}
