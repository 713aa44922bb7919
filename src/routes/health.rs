use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::SharedContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend_url: String,
    pub projects: usize,
    pub tracked_commits: usize,
    pub pending_commits: usize,
    pub docs_url: Option<String>,
    pub docs_root: Option<String>,
}

pub async fn health(State(ctx): State<SharedContext>) -> Json<HealthResponse> {
    let (projects, tracked_commits) = ctx
        .store
        .with_state(|state| {
            let tracked: usize = state.commits.entries.values().map(|c| c.len()).sum();
            (state.projects.entries.len(), tracked)
        })
        .await;
    let pending_commits = ctx.store.pending_commits().await.len();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend_url: ctx.config.backend_url.to_string(),
        projects,
        tracked_commits,
        pending_commits,
        docs_url: ctx.config.docs_url.clone(),
        docs_root: ctx.config.docs_root.clone(),
    })
}
