//! Shared step-emission seam. Every component that produces observable
//! steps (Search Adapter, Page Acquirer, Agent Loop) depends only on this
//! trait, not on the Journal or Hub directly — the gateway binary wires a
//! single implementation that does both (append to the Journal, then
//! publish to the Event Hub) so the two never drift apart.

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait StepEmitter: Send + Sync {
    async fn emit(&self, run_id: Uuid, kind: &str, title: &str, payload: serde_json::Value);
}

/// A no-op emitter, useful for unit tests of components that take a
/// `&dyn StepEmitter` but don't care about the emitted steps.
pub struct NullEmitter;

#[async_trait]
impl StepEmitter for NullEmitter {
    async fn emit(&self, _run_id: Uuid, _kind: &str, _title: &str, _payload: serde_json::Value) {}
}
