//! Production `Store` adapter backed by Postgres via `sqlx`, matching the
//! original's `pgx/v5` pool usage one level up: one `Store` call, one
//! prepared statement, connections borrowed from and returned to a pool.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use wsa_domain::error::{Error, Result};
use wsa_domain::model::{
    Message, PageCacheEntry, Role, Run, RunStatus, SearchQueryRecord, SearchResult, Source, Step,
};

use crate::Store;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| Error::Store(format!("connect: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("migrate: {e}")))?;
        Ok(())
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn role_from_str(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Finished => "finished",
        RunStatus::Failed => "failed",
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> Result<Uuid> {
        let chat_id = Uuid::new_v4();
        sqlx::query("insert into chats(id, user_id, title) values ($1, $2, $3)")
            .bind(chat_id)
            .bind(user_id)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("create_chat: {e}")))?;
        Ok(chat_id)
    }

    async fn create_run(&self, run: &Run) -> Result<()> {
        sqlx::query(
            "insert into runs(id, chat_id, user_id, model, status, started_at) \
             values ($1, $2, $3, $4, $5, $6)",
        )
        .bind(run.id)
        .bind(run.chat_id)
        .bind(run.user_id)
        .bind(&run.model)
        .bind(status_str(run.status))
        .bind(run.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("create_run: {e}")))?;
        Ok(())
    }

    async fn finish_run(&self, run_id: Uuid, error: Option<String>) -> Result<()> {
        let status = if error.is_some() { "failed" } else { "finished" };
        sqlx::query(
            "update runs set status = $2, error = $3, finished_at = now() where id = $1",
        )
        .bind(run_id)
        .bind(status)
        .bind(&error)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("finish_run: {e}")))?;
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
        // chat_id and run_id are bound as two distinct parameters even
        // though a run's chat can be looked up from runs — never reuse one
        // placeholder for two semantically different values (SPEC_FULL §9).
        sqlx::query(
            "insert into messages(id, chat_id, run_id, role, content, created_at) \
             values ($1, $2, $3, $4, $5, $6)",
        )
        .bind(msg.id)
        .bind(msg.chat_id)
        .bind(msg.run_id)
        .bind(role_str(msg.role))
        .bind(&msg.content)
        .bind(msg.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("insert_message: {e}")))?;
        Ok(msg)
    }

    async fn load_chat_history(&self, chat_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "select id, chat_id, run_id, role, content, created_at from messages \
             where chat_id = $1 order by created_at desc limit $2",
        )
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("load_chat_history: {e}")))?;

        let mut messages: Vec<Message> = rows
            .into_iter()
            .map(|row| Message {
                id: row.get("id"),
                chat_id: row.get("chat_id"),
                run_id: row.get("run_id"),
                role: role_from_str(row.get("role")),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn append_step(&self, step: &Step) -> Result<()> {
        sqlx::query(
            "insert into run_steps(run_id, type, title, payload, created_at) \
             values ($1, $2, $3, $4, $5)",
        )
        .bind(step.run_id)
        .bind(&step.kind)
        .bind(&step.title)
        .bind(&step.payload)
        .bind(step.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("append_step: {e}")))?;
        Ok(())
    }

    async fn replay_steps(&self, run_id: Uuid) -> Result<Vec<Step>> {
        let rows = sqlx::query(
            "select run_id, type, title, payload, created_at from run_steps \
             where run_id = $1 order by created_at asc",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("replay_steps: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Step {
                run_id: row.get("run_id"),
                kind: row.get("type"),
                title: row.get("title"),
                payload: row.get("payload"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn insert_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            "insert into sources(id, run_id, url, domain, title, favicon_url, created_at) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(source.id)
        .bind(source.run_id)
        .bind(&source.url)
        .bind(&source.domain)
        .bind(&source.title)
        .bind(&source.favicon_url)
        .bind(source.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("insert_source: {e}")))?;
        Ok(())
    }

    async fn update_source_title(&self, source_id: Uuid, title: &str) -> Result<()> {
        sqlx::query("update sources set title = $2 where id = $1")
            .bind(source_id)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("update_source_title: {e}")))?;
        Ok(())
    }

    async fn list_sources(&self, run_id: Uuid) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "select id, run_id, url, domain, title, favicon_url, created_at from sources \
             where run_id = $1 order by created_at asc",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("list_sources: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Source {
                id: row.get("id"),
                run_id: row.get("run_id"),
                url: row.get("url"),
                domain: row.get("domain"),
                title: row.get("title"),
                favicon_url: row.get("favicon_url"),
                created_at: row.get("created_at"),
                markdown_content: None,
            })
            .collect())
    }

    async fn insert_search_query(&self, record: &SearchQueryRecord) -> Result<()> {
        sqlx::query(
            "insert into search_queries(id, run_id, query, category, created_at) \
             values ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.run_id)
        .bind(&record.query)
        .bind(&record.category)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("insert_search_query: {e}")))?;
        Ok(())
    }

    async fn insert_search_results(&self, query_id: Uuid, results: &[SearchResult]) -> Result<()> {
        for r in results {
            sqlx::query(
                "insert into search_results(query_id, rank, title, url, snippet, engine, raw) \
                 values ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(query_id)
            .bind(r.rank as i32)
            .bind(&r.title)
            .bind(&r.url)
            .bind(&r.snippet)
            .bind(&r.engine)
            .bind(&r.raw)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("insert_search_results: {e}")))?;
        }
        Ok(())
    }

    async fn load_cached_page(&self, url: &str) -> Result<Option<PageCacheEntry>> {
        let row = sqlx::query(
            "select url, title, content, snippets, fetched_at from page_cache where url = $1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("load_cached_page: {e}")))?;

        Ok(row.map(|row| {
            let snippets_json: serde_json::Value = row.get("snippets");
            PageCacheEntry {
                url: row.get("url"),
                title: row.get("title"),
                content: row.get("content"),
                snippets: serde_json::from_value(snippets_json).unwrap_or_default(),
                fetched_at: row.get("fetched_at"),
            }
        }))
    }

    async fn upsert_page_cache(&self, entry: &PageCacheEntry) -> Result<()> {
        let snippets = serde_json::to_value(&entry.snippets).unwrap_or(serde_json::json!([]));
        sqlx::query(
            "insert into page_cache(url, title, content, snippets, fetched_at) \
             values ($1, $2, $3, $4, $5) \
             on conflict (url) do update set \
                title = excluded.title, content = excluded.content, \
                snippets = excluded.snippets, fetched_at = excluded.fetched_at",
        )
        .bind(&entry.url)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&snippets)
        .bind(entry.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("upsert_page_cache: {e}")))?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
create table if not exists chats (
    id uuid primary key,
    user_id uuid not null,
    title text not null,
    created_at timestamptz not null default now()
);

create table if not exists runs (
    id uuid primary key,
    chat_id uuid not null references chats(id),
    user_id uuid not null,
    model text,
    status text not null,
    error text,
    started_at timestamptz not null,
    finished_at timestamptz
);

create table if not exists messages (
    id uuid primary key,
    chat_id uuid not null references chats(id),
    run_id uuid references runs(id),
    role text not null,
    content text not null,
    created_at timestamptz not null
);

create table if not exists run_steps (
    id bigserial primary key,
    run_id uuid not null references runs(id),
    type text not null,
    title text not null,
    payload jsonb not null,
    created_at timestamptz not null
);

create table if not exists sources (
    id uuid primary key,
    run_id uuid not null references runs(id),
    url text not null,
    domain text not null,
    title text,
    favicon_url text,
    created_at timestamptz not null
);

create table if not exists search_queries (
    id uuid primary key,
    run_id uuid not null references runs(id),
    query text not null,
    category text,
    created_at timestamptz not null
);

create table if not exists search_results (
    id bigserial primary key,
    query_id uuid not null references search_queries(id),
    rank int not null,
    title text not null,
    url text not null,
    snippet text not null,
    engine text not null,
    raw jsonb not null
);

create table if not exists page_cache (
    url text primary key,
    title text,
    content text not null,
    snippets jsonb not null default '[]',
    fetched_at timestamptz not null
);
"#;
