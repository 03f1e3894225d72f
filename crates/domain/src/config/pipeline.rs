use serde::{Deserialize, Serialize};

/// Limits that bound a single run: iteration counts, per-call caps, and
/// the overall timeout the detached pipeline task runs under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(default = "d_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,
    #[serde(default = "d_search_max_queries")]
    pub search_max_queries: u32,
    #[serde(default = "d_search_max_sources")]
    pub search_max_sources: u32,
    #[serde(default = "d_chat_history_limit")]
    pub chat_history_limit: u32,
    #[serde(default = "d_page_cache_ttl_secs")]
    pub page_cache_ttl_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout_secs: d_pipeline_timeout_secs(),
            search_max_queries: d_search_max_queries(),
            search_max_sources: d_search_max_sources(),
            chat_history_limit: d_chat_history_limit(),
            page_cache_ttl_secs: d_page_cache_ttl_secs(),
        }
    }
}

impl PipelineConfig {
    /// Hard cap on model calls per run, per SPEC_FULL §4.5: `max(search_max_queries+4, 6)`.
    pub fn max_tool_loops(&self) -> u32 {
        (self.search_max_queries + 4).max(6)
    }
}

fn d_pipeline_timeout_secs() -> u64 {
    180
}

fn d_search_max_queries() -> u32 {
    4
}

fn d_search_max_sources() -> u32 {
    8
}

fn d_chat_history_limit() -> u32 {
    12
}

fn d_page_cache_ttl_secs() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tool_loops_respects_floor() {
        let mut cfg = PipelineConfig::default();
        cfg.search_max_queries = 1;
        assert_eq!(cfg.max_tool_loops(), 6);
        cfg.search_max_queries = 10;
        assert_eq!(cfg.max_tool_loops(), 14);
    }
}
