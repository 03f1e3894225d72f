use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "d_default_model")]
    pub default_model: String,
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub reasoning_enabled: bool,
    #[serde(default = "d_reasoning_effort")]
    pub reasoning_effort: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key: None,
            default_model: d_default_model(),
            timeout_secs: d_timeout_secs(),
            retry_count: d_retry_count(),
            reasoning_enabled: false,
            reasoning_effort: d_reasoning_effort(),
        }
    }
}

impl ModelConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn d_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn d_default_model() -> String {
    "openrouter/auto".to_string()
}

fn d_timeout_secs() -> u64 {
    60
}

fn d_retry_count() -> u32 {
    2
}

fn d_reasoning_effort() -> String {
    "medium".to_string()
}
