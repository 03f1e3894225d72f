//! The Run Orchestrator (C6): creates runs, launches the pipeline
//! detached from the HTTP request, and reconciles its outcome back into
//! the Journal/store. Grounded on the original's `StartRun`/`runPipeline`
//! pair — the pipeline task runs on a context derived from the process
//! root, not the request, so closing the client connection never cancels
//! a run.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use wsa_domain::config::PipelineConfig;
use wsa_domain::error::Result;
use wsa_domain::model::{step_type, Role, Run, SearchQueryRecord, Source};
use wsa_search::{build_search_queries, SearchAdapter};
use wsa_store::Store;

use crate::emitter::GatewayEmitter;

pub struct Orchestrator {
    store: Arc<dyn Store>,
    emitter: Arc<GatewayEmitter>,
    search: Arc<SearchAdapter>,
    agent: Arc<wsa_agent::AgentLoop>,
    pipeline: PipelineConfig,
    model_configured: bool,
}

pub struct StartOutcome {
    pub chat_id: Uuid,
    pub run_id: Uuid,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        emitter: Arc<GatewayEmitter>,
        search: Arc<SearchAdapter>,
        agent: Arc<wsa_agent::AgentLoop>,
        pipeline: PipelineConfig,
        model_configured: bool,
    ) -> Self {
        Self {
            store,
            emitter,
            search,
            agent,
            pipeline,
            model_configured,
        }
    }

    /// Resolves or creates the chat, inserts a run and the user's message,
    /// then launches the pipeline detached and returns immediately.
    pub async fn start(
        &self,
        user_id: Uuid,
        chat_id: Option<Uuid>,
        query: String,
        model: Option<String>,
    ) -> Result<StartOutcome> {
        let chat_id = match chat_id {
            Some(id) => id,
            None => {
                let title = query.chars().take(60).collect::<String>();
                self.store.create_chat(user_id, &title).await?
            }
        };

        let model_name = model.unwrap_or_default();
        let run = Run::new(chat_id, user_id, Some(model_name.clone()));
        let run_id = run.id;
        self.store.create_run(&run).await?;
        self.store
            .insert_message(chat_id, Some(run_id), Role::User, &query)
            .await?;

        let store = self.store.clone();
        let emitter = self.emitter.clone();
        let search = self.search.clone();
        let agent = self.agent.clone();
        let pipeline = self.pipeline.clone();
        let model_configured = self.model_configured;

        tokio::spawn(async move {
            run_pipeline(
                store,
                emitter,
                search,
                agent,
                pipeline,
                model_configured,
                run_id,
                chat_id,
                query,
                model_name,
            )
            .await;
        });

        Ok(StartOutcome { chat_id, run_id })
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    store: Arc<dyn Store>,
    emitter: Arc<GatewayEmitter>,
    search: Arc<SearchAdapter>,
    agent: Arc<wsa_agent::AgentLoop>,
    pipeline: PipelineConfig,
    model_configured: bool,
    run_id: Uuid,
    chat_id: Uuid,
    query: String,
    model: String,
) {
    let span = tracing::info_span!("run_pipeline", %run_id, %chat_id);
    let _enter = span.enter();

    emitter
        .emit_step(&wsa_domain::model::Step::new(
            run_id,
            step_type::RUN_STARTED,
            "Run started",
            serde_json::json!({ "query": query }),
        ))
        .await;
    emitter
        .emit_step(&wsa_domain::model::Step::new(
            run_id,
            step_type::PLAN_READY,
            "Plan ready",
            serde_json::json!({ "items": [query] }),
        ))
        .await;

    let timeout = Duration::from_secs(pipeline.pipeline_timeout_secs);
    let outcome = tokio::time::timeout(
        timeout,
        execute(
            &store,
            &emitter,
            &search,
            &agent,
            &pipeline,
            model_configured,
            run_id,
            chat_id,
            &query,
            &model,
        ),
    )
    .await;

    match outcome {
        Ok(Ok(answer)) => {
            match store
                .insert_message(chat_id, Some(run_id), Role::Assistant, &answer)
                .await
            {
                Ok(_) => {
                    let _ = store.finish_run(run_id, None).await;
                    emitter.emit_answer_final(run_id, &answer, &model).await;
                    emitter
                        .emit_step(&wsa_domain::model::Step::new(
                            run_id,
                            step_type::RUN_FINISHED,
                            "Run finished",
                            serde_json::json!({ "status": "ok" }),
                        ))
                        .await;
                }
                Err(err) => {
                    finish_with_error(&store, &emitter, run_id, err.to_string()).await;
                }
            }
        }
        Ok(Err(err)) => {
            finish_with_error(&store, &emitter, run_id, err.to_string()).await;
        }
        Err(_elapsed) => {
            finish_with_error(&store, &emitter, run_id, "run timed out".to_string()).await;
        }
    }
}

async fn finish_with_error(
    store: &Arc<dyn Store>,
    emitter: &Arc<GatewayEmitter>,
    run_id: Uuid,
    error: String,
) {
    let _ = store.finish_run(run_id, Some(error.clone())).await;
    emitter.emit_run_error(run_id, &error).await;
    emitter
        .emit_step(&wsa_domain::model::Step::new(
            run_id,
            step_type::RUN_FINISHED,
            "Run finished",
            serde_json::json!({ "status": "error" }),
        ))
        .await;
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    store: &Arc<dyn Store>,
    emitter: &Arc<GatewayEmitter>,
    search: &Arc<SearchAdapter>,
    agent: &Arc<wsa_agent::AgentLoop>,
    pipeline: &PipelineConfig,
    model_configured: bool,
    run_id: Uuid,
    chat_id: Uuid,
    query: &str,
    model: &str,
) -> Result<String> {
    if model_configured {
        agent
            .run(run_id, chat_id, query, model, emitter.as_ref())
            .await
    } else {
        degenerate_answer(store, emitter, search, pipeline, run_id, query).await
    }
}

/// The non-agent fallback path: one search call, no model, a templated
/// Markdown answer citing the top snippets. Used when no model
/// credentials are configured.
async fn degenerate_answer(
    store: &Arc<dyn Store>,
    emitter: &Arc<GatewayEmitter>,
    search: &Arc<SearchAdapter>,
    pipeline: &PipelineConfig,
    run_id: Uuid,
    query: &str,
) -> Result<String> {
    let queries = build_search_queries(query, 1);
    let raw_query = &queries[0];

    let record = SearchQueryRecord::new(run_id, raw_query.clone(), None);
    store.insert_search_query(&record).await?;
    emitter
        .emit_step(&wsa_domain::model::Step::new(
            run_id,
            step_type::SEARCH_QUERY,
            "Searching",
            serde_json::json!({ "query": raw_query }),
        ))
        .await;

    let mut results = search.search(raw_query, 0, 1).await?;
    results.truncate(pipeline.search_max_sources as usize);
    store.insert_search_results(record.id, &results).await?;
    emitter
        .emit_step(&wsa_domain::model::Step::new(
            run_id,
            step_type::SEARCH_RESULTS,
            "Search results",
            serde_json::json!({ "count": results.len() }),
        ))
        .await;

    if results.is_empty() {
        return Ok(
            "I could not find enough information to answer this confidently. Please try rephrasing the question."
                .to_string(),
        );
    }

    for (i, result) in results.iter().enumerate() {
        let domain = wsa_search::domain_from_url(&result.canonical_url);
        let source = Source::new(run_id, result.canonical_url.clone(), domain, Some(result.title.clone()));
        store.insert_source(&source).await?;
        let _ = i;
    }

    let mut answer = String::new();
    answer.push_str("Here is what I found:\n\n");
    for (i, result) in results.iter().enumerate() {
        let n = i + 1;
        answer.push_str(&format!(
            "{n}. **{title}** — {snippet} [{n}]({url})\n",
            title = result.title,
            snippet = result.snippet,
            url = result.canonical_url,
        ));
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsa_domain::config::{FetchConfig, ModelConfig, SearchConfig};
    use wsa_store::InMemoryStore;

    fn test_search() -> Arc<SearchAdapter> {
        Arc::new(SearchAdapter::new(SearchConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn orchestrator_start_creates_chat_run_and_message() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let hub = wsa_hub::EventHub::new();
        let emitter = Arc::new(GatewayEmitter::new(store.clone(), hub));
        let search = test_search();
        let transport = wsa_agent::transport::ModelTransport::new(ModelConfig::default());
        let agent_search = SearchAdapter::new(SearchConfig::default()).unwrap();
        let agent = Arc::new(wsa_agent::AgentLoop::new(
            transport,
            agent_search,
            wsa_fetch::PageAcquirer::new(FetchConfig::default(), store.clone()),
            store.clone(),
            PipelineConfig::default(),
        ));

        let orchestrator = Orchestrator::new(
            store.clone(),
            emitter,
            search,
            agent,
            PipelineConfig::default(),
            false,
        );

        let user_id = Uuid::new_v4();
        let outcome = orchestrator
            .start(user_id, None, "what is rust".to_string(), None)
            .await
            .unwrap();

        let history = store.load_chat_history(outcome.chat_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }
}
