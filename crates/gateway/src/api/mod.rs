pub mod runs;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full API router. Grounded on the teacher's own `api::router`
/// (public-routes-then-protected-routes assembly), trimmed to the routes
/// named in SPEC_FULL §6.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/runs/start", post(runs::start_run))
        .route("/runs/:id/stream", get(runs::stream_run))
        .route("/runs/:id/steps", get(runs::list_steps))
        .route("/runs/:id/sources", get(runs::list_sources))
}
