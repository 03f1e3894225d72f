use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Searx,
    Serper,
}

impl Default for SearchProvider {
    fn default() -> Self {
        SearchProvider::Searx
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: SearchProvider,
    #[serde(default = "d_searx_base_url")]
    pub searx_base_url: String,
    pub serper_api_key: Option<String>,
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::default(),
            searx_base_url: d_searx_base_url(),
            serper_api_key: None,
            timeout_secs: d_timeout_secs(),
        }
    }
}

fn d_searx_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn d_timeout_secs() -> u64 {
    15
}
