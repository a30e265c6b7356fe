//! Scenegen LLM - function-calling seam
//!
//! The generation engine never talks to a model directly. It hands an ordered
//! message sequence plus a JSON-schema function signature to a
//! [`FunctionCaller`] and receives the raw argument string back.
//!
//! - [`types`]: chat messages, function definitions, completion options
//! - [`openai`]: OpenAI-compatible HTTP implementation (Azure `api-version` aware)
//!
//! # Example
//!
//! ```rust,ignore
//! use scenegen_llm::{ChatMessage, CompletionOptions, FunctionCaller, OpenAiFunctionClient};
//!
//! # async fn example(function: scenegen_llm::FunctionDefinition) -> Result<(), scenegen_llm::LlmError> {
//! let client = OpenAiFunctionClient::from_env("https://api.openai.com/v1", "OPENAI_API_KEY")?;
//! let call = client
//!     .call_function(
//!         &[ChatMessage::user("generate a step")],
//!         &function,
//!         &CompletionOptions::new("gpt-35-turbo-16k", 0.5),
//!     )
//!     .await?;
//! println!("{}", call.arguments);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod caller;
pub mod error;
pub mod openai;
pub mod types;

pub use error::LlmError;
pub use openai::{OpenAiConfig, OpenAiFunctionClient};
pub use types::{ChatMessage, CompletionOptions, FunctionCall, FunctionDefinition, Role};

pub use caller::FunctionCaller;
#[cfg(any(test, feature = "mock"))]
pub use caller::MockFunctionCaller;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
