//! An in-memory `Store` test double. Used by this crate's own tests and by
//! the agent/orchestrator test suites so pipeline logic is verifiable
//! without a live Postgres instance.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use wsa_domain::error::Result;
use wsa_domain::model::{
    Message, PageCacheEntry, Role, Run, SearchQueryRecord, SearchResult, Source, Step,
};

use crate::Store;

#[derive(Default)]
struct Inner {
    chats: HashMap<Uuid, Uuid>, // chat_id -> user_id
    runs: HashMap<Uuid, Run>,
    messages: HashMap<Uuid, Vec<Message>>, // chat_id -> messages, ordered
    steps: HashMap<Uuid, Vec<Step>>,       // run_id -> steps, ordered
    sources: HashMap<Uuid, Vec<Source>>,   // run_id -> sources
    page_cache: HashMap<String, PageCacheEntry>,
    search_queries: HashMap<Uuid, SearchQueryRecord>,
    search_results: HashMap<Uuid, Vec<SearchResult>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_chat(&self, user_id: Uuid, _title: &str) -> Result<Uuid> {
        let chat_id = Uuid::new_v4();
        self.inner.lock().chats.insert(chat_id, user_id);
        Ok(chat_id)
    }

    async fn create_run(&self, run: &Run) -> Result<()> {
        self.inner.lock().runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn finish_run(&self, run_id: Uuid, error: Option<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(run) = inner.runs.get_mut(&run_id) {
            let status = if error.is_some() {
                wsa_domain::model::RunStatus::Failed
            } else {
                wsa_domain::model::RunStatus::Finished
            };
            run.finish(status, error);
        }
        Ok(())
    }

    async fn insert_message(
        &self,
        chat_id: Uuid,
        run_id: Option<Uuid>,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        let msg = Message::new(chat_id, run_id, role, content.to_string());
        self.inner
            .lock()
            .messages
            .entry(chat_id)
            .or_default()
            .push(msg.clone());
        Ok(msg)
    }

    async fn load_chat_history(&self, chat_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let inner = self.inner.lock();
        let msgs = inner.messages.get(&chat_id).cloned().unwrap_or_default();
        let start = msgs.len().saturating_sub(limit as usize);
        Ok(msgs[start..].to_vec())
    }

    async fn append_step(&self, step: &Step) -> Result<()> {
        self.inner
            .lock()
            .steps
            .entry(step.run_id)
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn replay_steps(&self, run_id: Uuid) -> Result<Vec<Step>> {
        Ok(self.inner.lock().steps.get(&run_id).cloned().unwrap_or_default())
    }

    async fn insert_source(&self, source: &Source) -> Result<()> {
        self.inner
            .lock()
            .sources
            .entry(source.run_id)
            .or_default()
            .push(source.clone());
        Ok(())
    }

    async fn update_source_title(&self, source_id: Uuid, title: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        for sources in inner.sources.values_mut() {
            if let Some(s) = sources.iter_mut().find(|s| s.id == source_id) {
                s.title = Some(title.to_string());
            }
        }
        Ok(())
    }

    async fn list_sources(&self, run_id: Uuid) -> Result<Vec<Source>> {
        Ok(self.inner.lock().sources.get(&run_id).cloned().unwrap_or_default())
    }

    async fn insert_search_query(&self, record: &SearchQueryRecord) -> Result<()> {
        self.inner
            .lock()
            .search_queries
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn insert_search_results(&self, query_id: Uuid, results: &[SearchResult]) -> Result<()> {
        self.inner
            .lock()
            .search_results
            .insert(query_id, results.to_vec());
        Ok(())
    }

    async fn load_cached_page(&self, url: &str) -> Result<Option<PageCacheEntry>> {
        Ok(self.inner.lock().page_cache.get(url).cloned())
    }

    async fn upsert_page_cache(&self, entry: &PageCacheEntry) -> Result<()> {
        self.inner
            .lock()
            .page_cache
            .insert(entry.url.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn page_cache_upsert_is_idempotent_on_url() {
        let store = InMemoryStore::new();
        let entry = PageCacheEntry {
            url: "https://example.com/a".into(),
            title: Some("A".into()),
            content: "first".into(),
            snippets: vec![],
            fetched_at: Utc::now(),
        };
        store.upsert_page_cache(&entry).await.unwrap();
        let mut updated = entry.clone();
        updated.content = "second".into();
        store.upsert_page_cache(&updated).await.unwrap();

        let loaded = store.load_cached_page(&entry.url).await.unwrap().unwrap();
        assert_eq!(loaded.content, "second");
        assert_eq!(store.inner.lock().page_cache.len(), 1);
    }

    #[tokio::test]
    async fn steps_replay_in_insertion_order() {
        let store = InMemoryStore::new();
        let run_id = Uuid::new_v4();
        for i in 0..5 {
            let step = Step::new(run_id, "search.query", format!("q{i}"), serde_json::json!({}));
            store.append_step(&step).await.unwrap();
        }
        let replayed = store.replay_steps(run_id).await.unwrap();
        let titles: Vec<_> = replayed.iter().map(|s| s.title.clone()).collect();
        assert_eq!(titles, vec!["q0", "q1", "q2", "q3", "q4"]);
    }
}
