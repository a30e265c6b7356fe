//! Scripted function caller

use async_trait::async_trait;
use parking_lot::Mutex;
use scenegen_llm::{ChatMessage, CompletionOptions, FunctionCall, FunctionCaller, FunctionDefinition, LlmError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Valid function arguments for a GET step with a status assertion
pub const SAMPLE_ARGUMENTS: &str = r#"{
    "name": "generated",
    "method": "GET",
    "url": "/generated",
    "headers": [{"key": "Authorization", "value": "${{ params.token }}"}],
    "params": [],
    "body": {"type": "application/json", "content": "{\"limit\":10}"},
    "outParams": [{"key": "status", "source": "status", "expression": "status"}],
    "asserts": [{"arg": "status", "operator": "=", "value": "200"}]
}"#;

/// Function caller answering from a script
///
/// Rules are matched against the concatenated message contents, so a rule
/// keyed on an API path applies to that API's unit only.
#[derive(Debug, Default)]
pub struct ScriptedCaller {
    arguments: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<String>>,
    delays: Mutex<Vec<(String, Duration)>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
    in_flight: InFlight,
}

impl ScriptedCaller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `arguments` when a message contains `fragment`
    #[must_use]
    pub fn answer_for(self, fragment: &str, arguments: &str) -> Self {
        self.arguments
            .lock()
            .push((fragment.to_string(), arguments.to_string()));
        self
    }

    /// Fail when a message contains `fragment`
    #[must_use]
    pub fn fail_for(self, fragment: &str) -> Self {
        self.failures.lock().push(fragment.to_string());
        self
    }

    /// Sleep before answering when a message contains `fragment`
    #[must_use]
    pub fn delay_for(self, fragment: &str, delay: Duration) -> Self {
        self.delays.lock().push((fragment.to_string(), delay));
        self
    }

    /// Number of calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max()
    }

    /// Message sequences received, in call order
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl FunctionCaller for ScriptedCaller {
    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionDefinition,
        _options: &CompletionOptions,
    ) -> Result<FunctionCall, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(messages.to_vec());
        let text: String = messages.iter().map(|m| m.content.as_str()).collect();

        let delay = self
            .delays
            .lock()
            .iter()
            .find(|(fragment, _)| text.contains(fragment.as_str()))
            .map(|(_, d)| *d);
        let _guard = self.in_flight.enter();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self
            .failures
            .lock()
            .iter()
            .any(|fragment| text.contains(fragment.as_str()))
        {
            return Err(LlmError::Request {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        let arguments = self
            .arguments
            .lock()
            .iter()
            .find(|(fragment, _)| text.contains(fragment.as_str()))
            .map_or_else(|| SAMPLE_ARGUMENTS.to_string(), |(_, args)| args.clone());

        Ok(FunctionCall {
            name: function.name.clone(),
            arguments,
        })
    }
}

/// Current and peak number of concurrent calls
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { owner: self }
    }

    fn max(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.current.fetch_sub(1, Ordering::SeqCst);
    }
}
