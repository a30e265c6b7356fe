//! The `create-autotest-scene` function descriptor
//!
//! Bundles everything the model call needs besides the per-unit context:
//! the fixed system and user messages, the argument schema and the
//! completion options.

use crate::error::SceneGenError;
use scenegen_llm::{ChatMessage, CompletionOptions, FunctionDefinition};

const SCHEMA_YAML: &str = include_str!("../assets/schema.yaml");
const SYSTEM_MESSAGE: &str = include_str!("../assets/system-message.txt");
const USER_MESSAGE: &str = include_str!("../assets/user-message.txt");

/// Descriptor of the scene-step generation function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStepFunction;

impl SceneStepFunction {
    /// Function name, also the expected `functionName` of the envelope
    pub const NAME: &'static str = "create-autotest-scene";
    /// Function description
    pub const DESCRIPTION: &'static str = "create autotest scene";
    /// Model identifier
    pub const MODEL: &'static str = "gpt-35-turbo-16k";
    /// Sampling temperature
    pub const TEMPERATURE: f32 = 0.5;
    /// Name attached to the system instruction
    pub const SYSTEM_NAME: &'static str = "system";
    /// Name attached to the user message
    pub const USER_NAME: &'static str = "erda";

    /// Fixed system instruction
    #[inline]
    #[must_use]
    pub fn system_message(self) -> &'static str {
        SYSTEM_MESSAGE
    }

    /// Fixed user prompt
    #[inline]
    #[must_use]
    pub fn user_message(self) -> &'static str {
        USER_MESSAGE
    }

    /// Argument schema as JSON
    ///
    /// # Errors
    /// `SceneGenError::Config` if the embedded YAML does not parse
    pub fn schema(self) -> Result<serde_json::Value, SceneGenError> {
        serde_yaml::from_str(SCHEMA_YAML)
            .map_err(|e| SceneGenError::Config(format!("function schema: {e}")))
    }

    /// Function signature handed to the provider
    ///
    /// # Errors
    /// `SceneGenError::Config` if the schema does not parse
    pub fn definition(self) -> Result<FunctionDefinition, SceneGenError> {
        Ok(FunctionDefinition {
            name: Self::NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            parameters: self.schema()?,
        })
    }

    /// Model and temperature
    #[inline]
    #[must_use]
    pub fn completion_options(self) -> CompletionOptions {
        CompletionOptions::new(Self::MODEL, Self::TEMPERATURE)
    }

    /// Ordered messages for one unit
    ///
    /// A non-empty `prompt` replaces the fixed user prompt.
    #[must_use]
    pub fn messages(self, api_detail: &str, context_prompt: &str, prompt: &str) -> Vec<ChatMessage> {
        let user = if prompt.trim().is_empty() {
            self.user_message()
        } else {
            prompt
        };
        vec![
            ChatMessage::system(self.system_message()).with_name(Self::SYSTEM_NAME),
            ChatMessage::system(format!(
                "The swagger documentation content of the API selected by the user: {api_detail}"
            )),
            ChatMessage::system(format!(
                "In this test case generation, you can also use these context variables: {context_prompt}"
            )),
            ChatMessage::user(user).with_name(Self::USER_NAME),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenegen_llm::Role;

    #[test]
    fn schema_converts_to_json_object() {
        let schema = SceneStepFunction.schema().unwrap();
        assert_eq!(schema["type"], "object");
        let props = schema["properties"].as_object().unwrap();
        for key in ["name", "url", "method", "headers", "params", "body", "outParams", "asserts"] {
            assert!(props.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn definition_and_options() {
        let def = SceneStepFunction.definition().unwrap();
        assert_eq!(def.name, "create-autotest-scene");
        assert_eq!(def.description, "create autotest scene");

        let options = SceneStepFunction.completion_options();
        assert_eq!(options.model, "gpt-35-turbo-16k");
        assert!((options.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn messages_are_ordered() {
        let messages = SceneStepFunction.messages("{\"path\":\"/pets\"}", "scene inputs: []", "");
        assert_eq!(messages.len(), 4);
        assert!(messages[..3].iter().all(|m| m.role == Role::System));
        assert_eq!(messages[0].content, SceneStepFunction.system_message());
        assert_eq!(messages[0].name.as_deref(), Some("system"));
        assert!(messages[1].name.is_none());
        assert!(messages[1].content.ends_with("{\"path\":\"/pets\"}"));
        assert!(messages[2].content.ends_with("scene inputs: []"));
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].name.as_deref(), Some("erda"));
        assert_eq!(messages[3].content, SceneStepFunction.user_message());
    }

    #[test]
    fn prompt_override_replaces_user_message() {
        let messages = SceneStepFunction.messages("{}", "", "only test the 404 path");
        assert_eq!(messages[3].content, "only test the 404 path");
    }
}
