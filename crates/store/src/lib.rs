//! The persistence port (§3.1 of SPEC_FULL): every operation the pipeline
//! needs from the relational store, named on a trait so the agent loop and
//! orchestrator can be exercised against an in-memory double instead of a
//! live Postgres instance.

mod memory;
mod pg;

pub use memory::InMemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use uuid::Uuid;
use wsa_domain::error::Result;
use wsa_domain::model::{
    Message, PageCacheEntry, Role, Run, SearchQueryRecord, SearchResult, Source, Step,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> Result<Uuid>;
    async fn create_run(&self, run: &Run) -> Result<()>;
    async fn finish_run(&self, run_id: Uuid, error: Option<String>) -> Result<()>;

    async fn insert_message(
        &self,
        chat_id: Uuid,
        run_id: Option<Uuid>,
        role: Role,
        content: &str,
    ) -> Result<Message>;
    async fn load_chat_history(&self, chat_id: Uuid, limit: u32) -> Result<Vec<Message>>;

    async fn append_step(&self, step: &Step) -> Result<()>;
    async fn replay_steps(&self, run_id: Uuid) -> Result<Vec<Step>>;

    async fn insert_source(&self, source: &Source) -> Result<()>;
    async fn update_source_title(&self, source_id: Uuid, title: &str) -> Result<()>;
    async fn list_sources(&self, run_id: Uuid) -> Result<Vec<Source>>;

    async fn insert_search_query(&self, record: &SearchQueryRecord) -> Result<()>;
    async fn insert_search_results(&self, query_id: Uuid, results: &[SearchResult]) -> Result<()>;

    async fn load_cached_page(&self, url: &str) -> Result<Option<PageCacheEntry>>;
    async fn upsert_page_cache(&self, entry: &PageCacheEntry) -> Result<()>;
}
