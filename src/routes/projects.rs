use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::DashboardError;
use crate::poller;
use crate::server::SharedContext;

#[derive(Deserialize)]
pub struct ProjectQuery {
    pub project: String,
}

/// GET /api/projects — the projects slice as last fetched, with any
/// fetch error recorded alongside.
pub async fn projects(State(ctx): State<SharedContext>) -> impl IntoResponse {
    let slice = ctx.store.with_state(|state| state.projects.clone()).await;
    Json(slice)
}

/// POST /api/projects/refresh — fetch the catalog from the backend and
/// return the updated slice.
pub async fn refresh_projects(State(ctx): State<SharedContext>) -> impl IntoResponse {
    poller::refresh_projects(&ctx.store, &ctx.client).await;
    let slice = ctx.store.with_state(|state| state.projects.clone()).await;
    Json(slice)
}

/// GET /api/branches?project=
pub async fn branches(
    State(ctx): State<SharedContext>,
    Query(query): Query<ProjectQuery>,
) -> Result<impl IntoResponse, DashboardError> {
    let entry = ctx
        .store
        .with_state(|state| state.projects.entries.get(&query.project).cloned())
        .await
        .ok_or_else(|| DashboardError::UnknownProject(query.project.clone()))?;

    Ok(Json(serde_json::json!({
        "project": query.project,
        "branches": entry.branches,
        "error": entry.branches_error,
    })))
}

/// POST /api/branches/refresh?project=
pub async fn refresh_branches(
    State(ctx): State<SharedContext>,
    Query(query): Query<ProjectQuery>,
) -> Result<impl IntoResponse, DashboardError> {
    poller::refresh_branches(&ctx.store, &ctx.client, &query.project).await;
    branches(State(ctx), Query(query)).await
}
