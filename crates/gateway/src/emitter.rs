//! The `StepEmitter` the gateway wires up: every step is appended to the
//! Journal (C2, `wsa-store`) and then published to the Hub (C1,
//! `wsa-hub`) as a pre-formatted SSE wire frame, grounded on the
//! original's `publishStep` (marshal payload → insert into `run_steps` →
//! marshal a `{type, title, payload, created_at}` frame → write
//! `"event: step\ndata: <frame>\n\n"` straight onto the run's broadcaster).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use wsa_domain::emitter::StepEmitter;
use wsa_domain::model::Step;
use wsa_hub::EventHub;
use wsa_store::Store;

pub struct GatewayEmitter {
    store: Arc<dyn Store>,
    hub: EventHub,
}

impl GatewayEmitter {
    pub fn new(store: Arc<dyn Store>, hub: EventHub) -> Self {
        Self { store, hub }
    }

    /// Publishes an already-built step, used by the orchestrator for
    /// events that aren't routed through the generic `emit` seam
    /// (`run.started`, `run.finished`).
    pub async fn emit_step(&self, step: &Step) {
        if let Err(err) = self.store.append_step(step).await {
            tracing::warn!(run_id = %step.run_id, %err, "failed to persist step");
        }
        self.hub.publish(step.run_id, frame(step));
    }

    /// Publishes the terminal `answer.final` event, grounded on the
    /// original's `publishFinal` (runs.go:213): Hub-only, never journaled
    /// as a step, so it can't be replayed twice from `replay_steps`.
    pub async fn emit_answer_final(&self, run_id: Uuid, answer: &str, model: &str) {
        let body = serde_json::json!({ "answer": answer, "model": model });
        self.hub.publish(run_id, named_frame("answer.final", &body));
    }

    /// Publishes the terminal `run.error` event, grounded on the
    /// original's `publishRunError` (runs.go:215): Hub-only, same
    /// rationale as `emit_answer_final`.
    pub async fn emit_run_error(&self, run_id: Uuid, error: &str) {
        let body = serde_json::json!({ "error": error });
        self.hub.publish(run_id, named_frame("run.error", &body));
    }
}

#[async_trait]
impl StepEmitter for GatewayEmitter {
    async fn emit(&self, run_id: Uuid, kind: &str, title: &str, payload: serde_json::Value) {
        let step = Step::new(run_id, kind, title, payload);
        self.emit_step(&step).await;
    }
}

/// Renders one step as a complete SSE `step` event, matching the
/// original's wire format byte-for-byte. Shared with the journal-replay
/// path in `api::runs` so a live frame and a replayed frame are
/// byte-identical.
pub(crate) fn frame(step: &Step) -> Bytes {
    let body = serde_json::json!({
        "type": step.kind,
        "title": step.title,
        "payload": step.payload,
        "created_at": step.created_at,
    });
    Bytes::from(format!("event: step\ndata: {body}\n\n"))
}

/// Renders a bare, un-enveloped SSE frame under a named event — used for
/// `answer.final`/`run.error`, which are not steps and are never replayed
/// from the Journal.
fn named_frame(event: &str, body: &serde_json::Value) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {body}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsa_store::InMemoryStore;

    #[tokio::test]
    async fn emit_persists_and_publishes() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let hub = EventHub::new();
        let run_id = Uuid::new_v4();
        let mut sub = hub.subscribe(run_id);

        let emitter = GatewayEmitter::new(store.clone(), hub);
        emitter
            .emit(run_id, "search.query", "Searching", serde_json::json!({"q": "rust"}))
            .await;

        let persisted = store.replay_steps(run_id).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].kind, "search.query");

        let published = sub.receiver.recv().await.unwrap();
        let text = String::from_utf8(published.to_vec()).unwrap();
        assert!(text.starts_with("event: step\ndata: "));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("\"q\":\"rust\""));
    }

    #[tokio::test]
    async fn answer_final_and_run_error_are_not_journaled() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let hub = EventHub::new();
        let run_id = Uuid::new_v4();
        let mut sub = hub.subscribe(run_id);

        let emitter = GatewayEmitter::new(store.clone(), hub);
        emitter.emit_answer_final(run_id, "**hi**", "gpt-test").await;
        emitter.emit_run_error(run_id, "boom").await;

        let persisted = store.replay_steps(run_id).await.unwrap();
        assert!(persisted.is_empty());

        let first = sub.receiver.recv().await.unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: answer.final\ndata: "));
        assert!(first.contains("\"answer\":\"**hi**\""));
        assert!(first.contains("\"model\":\"gpt-test\""));

        let second = sub.receiver.recv().await.unwrap();
        let second = String::from_utf8(second.to_vec()).unwrap();
        assert!(second.starts_with("event: run.error\ndata: "));
        assert!(second.contains("\"error\":\"boom\""));
    }
}
