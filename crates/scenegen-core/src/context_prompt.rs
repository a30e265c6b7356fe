//! Context prompt builder
//!
//! Collects the five variable sets visible at a scene step and renders them
//! into a labeled text block. The block is opaque prompt context; nothing
//! parses it back.

use crate::context::ApplyContext;
use crate::error::{Cancelled, PlatformError};
use crate::platform::{ContextVariable, StepContextSource};
use std::sync::Arc;

/// Variables visible at one scene step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepVariables {
    /// Scene-level inputs
    pub scene_inputs: Vec<ContextVariable>,
    /// Outputs of preceding steps
    pub preceding_step_outputs: Vec<ContextVariable>,
    /// Outputs of preceding configuration sheets
    pub preceding_config_sheet_outputs: Vec<ContextVariable>,
    /// Global configuration outputs
    pub global_config_outputs: Vec<ContextVariable>,
    /// Mock inputs
    pub mock_inputs: Vec<ContextVariable>,
}

impl StepVariables {
    /// Render the five labeled sections
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "\nScene inputs: {}\nPreceding step outputs: {}\nPreceding config sheet outputs: {}\n\
             Global config inputs: {}\nMock: {}\n",
            to_json(&self.scene_inputs),
            to_json(&self.preceding_step_outputs),
            to_json(&self.preceding_config_sheet_outputs),
            to_json(&self.global_config_outputs),
            to_json(&self.mock_inputs),
        )
    }
}

fn to_json(vars: &[ContextVariable]) -> String {
    serde_json::to_string(vars).unwrap_or_else(|_| "[]".to_string())
}

/// Builds the context prompt of a scene step
#[derive(Clone)]
pub struct ContextPromptBuilder {
    source: Arc<dyn StepContextSource>,
}

impl std::fmt::Debug for ContextPromptBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPromptBuilder").finish_non_exhaustive()
    }
}

impl ContextPromptBuilder {
    /// Create builder
    #[inline]
    #[must_use]
    pub fn new(source: Arc<dyn StepContextSource>) -> Self {
        Self { source }
    }

    /// Gather the five sets concurrently
    ///
    /// `step_id` 0 addresses a step appended at the end of the scene.
    ///
    /// # Errors
    /// - `Ok(Err(_))` with the first collaborator failure
    /// - `Err(Cancelled)` if the batch was cancelled
    pub async fn gather(
        &self,
        ctx: &ApplyContext,
        step_id: u64,
        scene_id: u64,
    ) -> Result<Result<StepVariables, PlatformError>, Cancelled> {
        let user = ctx.user_id.as_str();
        let source = &self.source;
        ctx.guard(async move {
            let (
                scene_inputs,
                preceding_step_outputs,
                preceding_config_sheet_outputs,
                global_config_outputs,
                mock_inputs,
            ) = tokio::try_join!(
                source.scene_inputs(scene_id, user),
                source.preceding_step_outputs(step_id, scene_id, user),
                source.preceding_config_sheet_outputs(step_id, scene_id, user),
                source.global_config_outputs(scene_id, user),
                source.mock_inputs(scene_id, user),
            )?;
            Ok(StepVariables {
                scene_inputs,
                preceding_step_outputs,
                preceding_config_sheet_outputs,
                global_config_outputs,
                mock_inputs,
            })
        })
        .await
    }

    /// Gather and render
    ///
    /// # Errors
    /// Same as [`ContextPromptBuilder::gather`]
    pub async fn build(
        &self,
        ctx: &ApplyContext,
        step_id: u64,
        scene_id: u64,
    ) -> Result<Result<String, PlatformError>, Cancelled> {
        let vars = self.gather(ctx, step_id, scene_id).await?;
        Ok(vars.map(|v| {
            tracing::debug!(
                "context prompt for scene {}: {} scene inputs, {} step outputs",
                scene_id,
                v.scene_inputs.len(),
                v.preceding_step_outputs.len()
            );
            v.render()
        }))
    }
}
