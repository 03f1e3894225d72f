//! Core domain types shared by every component of the research pipeline.
//!
//! These mirror the relational schema in `wsa-store` but are kept free of
//! any storage concern so the agent loop, search adapter, and fetch layer
//! can be tested without a database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub model: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(chat_id: Uuid, user_id: Uuid, model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            user_id,
            model,
            status: RunStatus::Running,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition to a terminal status. Panics in debug builds if called
    /// twice — run status transitions are monotonic (I1 in SPEC_FULL §8).
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        debug_assert!(!self.status.is_terminal(), "run already terminal");
        debug_assert!(status.is_terminal(), "finish() requires a terminal status");
        self.status = status;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Step type tags, matching the SSE event catalogue in SPEC_FULL §6.
pub mod step_type {
    pub const RUN_STARTED: &str = "run.started";
    pub const PLAN_READY: &str = "plan.ready";
    pub const SEARCH_QUERY: &str = "search.query";
    pub const SEARCH_RESULTS: &str = "search.results";
    pub const AGENT_REASONING: &str = "agent.reasoning";
    pub const AGENT_MESSAGE: &str = "agent.message";
    pub const AGENT_FETCH: &str = "agent.fetch";
    pub const SOURCES_SELECTED: &str = "sources.selected";
    pub const PAGE_FETCH_STARTED: &str = "page.fetch.started";
    pub const PAGE_FETCH_OK: &str = "page.fetch.ok";
    pub const PAGE_FETCH_PDF: &str = "page.fetch.pdf";
    pub const PAGE_FETCH_ERROR: &str = "page.fetch.error";
    pub const PAGE_FETCH_SKIPPED: &str = "page.fetch.skipped";
    pub const PAGE_READABILITY_READY: &str = "page.readability.ready";
    pub const RUN_FINISHED: &str = "run.finished";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub run_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Step {
    pub fn new(
        run_id: Uuid,
        kind: impl Into<String>,
        title: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            run_id,
            kind: kind.into(),
            title: title.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub run_id: Uuid,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub favicon_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Extracted content for this run's lifetime. Not persisted on this
    /// record — it lives keyed by URL in the page cache (see [`PageCacheEntry`]).
    #[serde(skip)]
    pub markdown_content: Option<String>,
}

impl Source {
    pub fn new(run_id: Uuid, url: String, domain: String, title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            url,
            domain,
            title,
            favicon_url: None,
            created_at: Utc::now(),
            markdown_content: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQueryRecord {
    pub id: Uuid,
    pub run_id: Uuid,
    pub query: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SearchQueryRecord {
    pub fn new(run_id: Uuid, query: String, category: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            query,
            category,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    pub snippet: String,
    pub engine: String,
    pub rank: usize,
    pub query_index: usize,
    pub score: f64,
    pub raw: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Page cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCacheEntry {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub snippets: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub run_id: Option<Uuid>,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(chat_id: Uuid, run_id: Option<Uuid>, role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            run_id,
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_finish_sets_terminal_fields() {
        let mut run = Run::new(Uuid::new_v4(), Uuid::new_v4(), Some("gpt".into()));
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
        run.finish(RunStatus::Finished, None);
        assert_eq!(run.status, RunStatus::Finished);
        assert!(run.finished_at.is_some());
        assert!(run.error.is_none());
    }

    #[test]
    #[should_panic]
    fn run_finish_twice_panics() {
        let mut run = Run::new(Uuid::new_v4(), Uuid::new_v4(), None);
        run.finish(RunStatus::Finished, None);
        run.finish(RunStatus::Failed, Some("x".into()));
    }

    #[test]
    fn run_status_is_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
