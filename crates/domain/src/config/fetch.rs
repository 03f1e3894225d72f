use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_max_html_bytes")]
    pub max_html_bytes: usize,
    #[serde(default = "d_max_pdf_bytes")]
    pub max_pdf_bytes: usize,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: d_timeout_secs(),
            max_html_bytes: d_max_html_bytes(),
            max_pdf_bytes: d_max_pdf_bytes(),
            user_agent: d_user_agent(),
        }
    }
}

fn d_timeout_secs() -> u64 {
    20
}

/// 2 MiB, per SPEC_FULL §4.4 step 4.
fn d_max_html_bytes() -> usize {
    2 * 1024 * 1024
}

/// 25 MiB, per SPEC_FULL §4.4 step 4.
fn d_max_pdf_bytes() -> usize {
    25 * 1024 * 1024
}

fn d_user_agent() -> String {
    "Mozilla/5.0 (compatible; research-agent/1.0; +https://example.invalid/bot)".to_string()
}
