//! Scene-step specification produced by the model
//!
//! The function arguments decode into [`ApiInfo`]; the step value stored on
//! the platform is the JSON of [`ApiSpec`].

use serde::{Deserialize, Serialize};

/// Body type that gets pretty-printed
pub const APPLICATION_JSON: &str = "application/json";

/// One HTTP call of a scene step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInfo {
    /// Step local id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Request URL
    #[serde(default)]
    pub url: String,
    /// HTTP method
    #[serde(default)]
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<ApiParam>,
    /// Query parameters
    #[serde(default)]
    pub params: Vec<ApiParam>,
    /// Request body
    #[serde(default)]
    pub body: ApiBody,
    /// Values extracted from the response
    #[serde(default)]
    pub out_params: Vec<ApiOutParam>,
    /// Response assertions
    #[serde(default)]
    pub asserts: Vec<ApiAssert>,
}

impl ApiInfo {
    /// Overlay the caller-known summary onto model output
    pub fn overlay_summary(&mut self, name: &str, method: &str, url: &str) {
        self.name = name.to_string();
        self.method = method.to_string();
        self.url = url.to_string();
    }

    /// Pretty-print a JSON body given as a string
    ///
    /// Bodies that are not valid JSON are left as they are.
    pub fn prettify_body(&mut self) {
        if self.body.body_type != APPLICATION_JSON {
            return;
        }
        let serde_json::Value::String(raw) = &self.body.content else {
            return;
        };
        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
            return;
        };
        if let Ok(pretty) = serde_json::to_string_pretty(&parsed) {
            self.body.content = serde_json::Value::String(pretty);
        }
    }
}

/// Key/value pair of headers and query params
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParam {
    /// Name
    #[serde(default)]
    pub key: String,
    /// Value or expression
    #[serde(default)]
    pub value: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiBody {
    /// Content type, e.g. `application/json`
    #[serde(rename = "type", default)]
    pub body_type: String,
    /// Body content, usually a string
    #[serde(default)]
    pub content: serde_json::Value,
}

/// Output extracted from a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOutParam {
    /// Variable name
    #[serde(default)]
    pub key: String,
    /// Where to read from: status, header, body:json ...
    #[serde(default)]
    pub source: String,
    /// Extraction expression
    #[serde(default)]
    pub expression: String,
    /// Match index for multi-valued results
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub match_index: String,
}

/// Response assertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAssert {
    /// Asserted output param
    #[serde(default)]
    pub arg: String,
    /// Comparison operator
    #[serde(default)]
    pub operator: String,
    /// Expected value
    #[serde(default)]
    pub value: String,
}

/// Stored step value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    /// The API call
    #[serde(rename = "apiSpec")]
    pub api_info: ApiInfo,
    /// Loop strategy, never generated
    #[serde(rename = "loop")]
    pub loop_strategy: Option<serde_json::Value>,
}

impl ApiSpec {
    /// Wrap an API call without loop strategy
    #[inline]
    #[must_use]
    pub fn new(api_info: ApiInfo) -> Self {
        Self {
            api_info,
            loop_strategy: None,
        }
    }
}
