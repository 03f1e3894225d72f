//! The Agent Loop (C5): a bounded tool-calling loop around the model
//! transport, grounded on `runAgentPipeline` in the original pipeline.

pub mod transport;
mod tools;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use serde::Deserialize;
use uuid::Uuid;

use transport::{ChatMessage, ModelTransport, ToolCall};
use wsa_domain::config::PipelineConfig;
use wsa_domain::emitter::StepEmitter;
use wsa_domain::error::Result;
use wsa_domain::model::{step_type, Message, Role, SearchQueryRecord, Source};
use wsa_fetch::PageAcquirer;
use wsa_search::{domain_from_url, SearchAdapter};
use wsa_store::Store;

const FALLBACK_ANSWER: &str =
    "I could not find enough information to answer this confidently. Please try rephrasing the question.";

/// Chat-message content is truncated to this many runes before being
/// emitted as an `agent.reasoning` step, matching the original's cap.
const MAX_REASONING_CHARS: usize = 2000;

/// How much of a fetched page's extracted content is handed back to the
/// model per source in a single `fetch` tool result.
const MAX_TOOL_CONTENT_CHARS: usize = 6000;

pub struct AgentLoop {
    transport: ModelTransport,
    search: SearchAdapter,
    fetch: PageAcquirer,
    store: Arc<dyn Store>,
    pipeline: PipelineConfig,
}

impl AgentLoop {
    pub fn new(
        transport: ModelTransport,
        search: SearchAdapter,
        fetch: PageAcquirer,
        store: Arc<dyn Store>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            transport,
            search,
            fetch,
            store,
            pipeline,
        }
    }

    /// Runs the bounded tool loop to completion and returns the final
    /// answer text. Errors only on a fatal-to-run failure (I3 in
    /// SPEC_FULL §8); tool-level and per-URL failures are absorbed and
    /// reported back to the model as `{ok: false, error: ...}`.
    pub async fn run(
        &self,
        run_id: Uuid,
        chat_id: Uuid,
        query: &str,
        model: &str,
        emitter: &dyn StepEmitter,
    ) -> Result<String> {
        let max_iterations = self.pipeline.max_tool_loops();

        let history = self
            .store
            .load_chat_history(chat_id, self.pipeline.chat_history_limit)
            .await?;
        let trimmed = trim_history(history, query);

        let mut messages = vec![ChatMessage::system(system_prompt())];
        for msg in &trimmed {
            messages.push(to_chat_message(msg));
        }
        messages.push(ChatMessage::user(query.to_string()));

        let tool_defs = tools::tool_definitions();

        let mut search_calls: u32 = 0;
        let mut seen_urls: HashSet<String> = HashSet::new();

        for _ in 0..max_iterations {
            let reply = self.transport.chat(model, &messages, &tool_defs).await?;

            if !reply.reasoning.is_empty() {
                emitter
                    .emit(
                        run_id,
                        step_type::AGENT_REASONING,
                        "Reasoning",
                        serde_json::json!({ "text": truncate_chars(&reply.reasoning, MAX_REASONING_CHARS) }),
                    )
                    .await;
            }

            if reply.tool_calls.is_empty() {
                if reply.content.trim().is_empty() {
                    break;
                }
                emitter
                    .emit(
                        run_id,
                        step_type::AGENT_MESSAGE,
                        "Agent",
                        serde_json::json!({ "content": reply.content }),
                    )
                    .await;
                continue;
            }

            let assistant_content = if reply.content.is_empty() {
                None
            } else {
                Some(reply.content.clone())
            };
            messages.push(ChatMessage::assistant_with_tool_calls(
                assistant_content,
                reply.tool_calls.clone(),
            ));

            for call in &reply.tool_calls {
                let outcome = self
                    .dispatch_tool(run_id, call, &mut search_calls, &mut seen_urls, emitter)
                    .await;

                match outcome {
                    ToolOutcome::Continue(body) => {
                        messages.push(ChatMessage::tool_result(
                            call.id.clone(),
                            call.function.name.clone(),
                            body,
                        ));
                    }
                    ToolOutcome::FinalAnswer(answer) => return Ok(answer),
                }
            }
        }

        Ok(FALLBACK_ANSWER.to_string())
    }

    async fn dispatch_tool(
        &self,
        run_id: Uuid,
        call: &ToolCall,
        search_calls: &mut u32,
        seen_urls: &mut HashSet<String>,
        emitter: &dyn StepEmitter,
    ) -> ToolOutcome {
        match call.function.name.as_str() {
            "search" => ToolOutcome::Continue(self.tool_search(run_id, call, search_calls, emitter).await),
            "fetch" => ToolOutcome::Continue(self.tool_fetch(run_id, call, seen_urls, emitter).await),
            "final_answer" => self.tool_final_answer(call),
            other => ToolOutcome::Continue(tool_error(format!("unknown tool: {other}"))),
        }
    }

    async fn tool_search(
        &self,
        run_id: Uuid,
        call: &ToolCall,
        search_calls: &mut u32,
        emitter: &dyn StepEmitter,
    ) -> String {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            #[serde(default)]
            max_results: Option<usize>,
        }
        let args: Args = match serde_json::from_str(&call.function.arguments) {
            Ok(a) => a,
            Err(e) => return tool_error(format!("invalid search arguments: {e}")),
        };
        if args.query.trim().is_empty() {
            return tool_error("search query must not be empty");
        }
        if *search_calls >= self.pipeline.search_max_queries {
            return tool_error("search limit reached for this run");
        }
        *search_calls += 1;

        emitter
            .emit(
                run_id,
                step_type::SEARCH_QUERY,
                "Searching",
                serde_json::json!({ "query": args.query }),
            )
            .await;

        let results = match self
            .search
            .search(&args.query, *search_calls as usize, self.pipeline.search_max_queries as usize)
            .await
        {
            Ok(r) => r,
            Err(e) => return tool_error(e.to_string()),
        };

        let max_results = args.max_results.unwrap_or(5).max(1);
        let truncated: Vec<_> = results.into_iter().take(max_results).collect();

        let record = SearchQueryRecord::new(run_id, args.query.clone(), None);
        let _ = self.store.insert_search_query(&record).await;
        let _ = self.store.insert_search_results(record.id, &truncated).await;

        emitter
            .emit(
                run_id,
                step_type::SEARCH_RESULTS,
                "Search results",
                serde_json::json!({ "query": args.query, "count": truncated.len() }),
            )
            .await;

        tool_ok(&truncated)
    }

    async fn tool_fetch(
        &self,
        run_id: Uuid,
        call: &ToolCall,
        seen_urls: &mut HashSet<String>,
        emitter: &dyn StepEmitter,
    ) -> String {
        #[derive(Deserialize)]
        struct UrlEntry {
            url: String,
            #[serde(default)]
            title: Option<String>,
        }
        #[derive(Deserialize)]
        struct Args {
            urls: Vec<UrlEntry>,
        }
        let args: Args = match serde_json::from_str(&call.function.arguments) {
            Ok(a) => a,
            Err(e) => return tool_error(format!("invalid fetch arguments: {e}")),
        };

        let mut fresh = Vec::new();
        for entry in args.urls {
            if seen_urls.len() >= self.pipeline.search_max_sources as usize {
                break;
            }
            let Some(canonical) = wsa_search::canonicalize(&entry.url) else {
                continue;
            };
            if !seen_urls.insert(canonical.clone()) {
                continue;
            }
            let domain = domain_from_url(&canonical);
            fresh.push(Source::new(run_id, canonical, domain, entry.title));
        }

        if fresh.is_empty() {
            return tool_ok(&Vec::<Source>::new());
        }

        emitter
            .emit(
                run_id,
                step_type::AGENT_FETCH,
                "Fetching pages",
                serde_json::json!({ "urls": fresh.iter().map(|s| &s.url).collect::<Vec<_>>() }),
            )
            .await;

        for source in &fresh {
            let _ = self.store.insert_source(source).await;
        }

        emitter
            .emit(
                run_id,
                step_type::SOURCES_SELECTED,
                "Sources selected",
                serde_json::json!({ "sources": fresh.iter().map(|s| serde_json::json!({ "url": s.url, "domain": s.domain })).collect::<Vec<_>>() }),
            )
            .await;

        self.fetch
            .acquire(run_id, &mut fresh, self.pipeline.page_cache_ttl_secs, emitter)
            .await;

        let payload: Vec<_> = fresh
            .iter()
            .map(|s| {
                serde_json::json!({
                    "url": s.url,
                    "title": s.title,
                    "content": s.markdown_content.as_deref().map(|c| truncate_chars(c, MAX_TOOL_CONTENT_CHARS)),
                })
            })
            .collect();

        tool_ok(&payload)
    }

    fn tool_final_answer(&self, call: &ToolCall) -> ToolOutcome {
        #[derive(Deserialize)]
        struct Args {
            answer: String,
        }
        let args: Args = match serde_json::from_str(&call.function.arguments) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::Continue(tool_error(format!("invalid final_answer arguments: {e}"))),
        };
        if args.answer.trim().is_empty() {
            return ToolOutcome::Continue(tool_error("final answer must not be empty"));
        }
        ToolOutcome::FinalAnswer(args.answer)
    }
}

enum ToolOutcome {
    Continue(String),
    FinalAnswer(String),
}

fn tool_ok<T: serde::Serialize>(result: &T) -> String {
    serde_json::json!({ "ok": true, "result": result }).to_string()
}

fn tool_error(message: impl Into<String>) -> String {
    serde_json::json!({ "ok": false, "error": message.into() }).to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

fn system_prompt() -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S %Z");
    format!(
        "Current local date and time: {now}. You are the primary research agent. \
         Decide whether to answer directly or use tools.\n\
         Rules:\n\
         - Cite sources as [n], matching the order pages were fetched in.\n\
         - Use $...$ for inline math and $$...$$ for display math.\n\
         - Do not answer directly in plain content; call final_answer to end the research loop."
    )
}

/// Mirrors the original `trimHistory`: drops the trailing history item
/// only when it is the user's own just-submitted query, so the caller's
/// fresh `ChatMessage::user(query)` is never duplicated.
fn trim_history(mut history: Vec<Message>, query: &str) -> Vec<Message> {
    if let Some(last) = history.last() {
        if last.role == Role::User && last.content.trim() == query.trim() {
            history.pop();
        }
    }
    history
}

fn to_chat_message(msg: &Message) -> ChatMessage {
    match msg.role {
        Role::User => ChatMessage::user(msg.content.clone()),
        Role::Assistant => ChatMessage::assistant(Some(msg.content.clone())),
        Role::System => ChatMessage::system(msg.content.clone()),
        Role::Tool => ChatMessage::assistant(Some(msg.content.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsa_domain::model::Role;

    fn msg(role: Role, content: &str) -> Message {
        Message::new(Uuid::new_v4(), None, role, content.to_string())
    }

    #[test]
    fn trim_history_drops_duplicate_trailing_user_query() {
        let history = vec![msg(Role::User, "earlier question"), msg(Role::User, "what is rust")];
        let trimmed = trim_history(history, "what is rust");
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].content, "earlier question");
    }

    #[test]
    fn trim_history_keeps_everything_when_last_is_not_duplicate() {
        let history = vec![msg(Role::User, "earlier question"), msg(Role::Assistant, "an answer")];
        let trimmed = trim_history(history, "what is rust");
        assert_eq!(trimmed.len(), 2);
    }

    #[test]
    fn truncate_chars_respects_rune_boundary() {
        let s = "a".repeat(10);
        assert_eq!(truncate_chars(&s, 5).len(), 5);
        assert_eq!(truncate_chars(&s, 50).len(), 10);
    }

    #[test]
    fn tool_error_shape_has_ok_false() {
        let body = tool_error("boom");
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "boom");
    }
}
