use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::CommitListQuery;
use crate::error::DashboardError;
use crate::poller;
use crate::server::SharedContext;

#[derive(Deserialize)]
pub struct CommitListParams {
    pub project: String,
    pub branch: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub metrics: Option<String>,
    pub committer: Option<String>,
}

#[derive(Deserialize)]
pub struct CommitParams {
    pub project: String,
    pub id: String,
    pub branch: Option<String>,
    pub batch: Option<String>,
}

/// GET /api/commits?project= — the stored commit-summary list.
pub async fn commit_list(
    State(ctx): State<SharedContext>,
    Query(params): Query<CommitListParams>,
) -> Result<impl IntoResponse, DashboardError> {
    let entry = ctx
        .store
        .with_state(|state| state.projects.entries.get(&params.project).cloned())
        .await
        .ok_or_else(|| DashboardError::UnknownProject(params.project.clone()))?;

    Ok(Json(serde_json::json!({
        "project": params.project,
        "commits": entry.commit_list,
        "error": entry.commit_list_error,
    })))
}

/// POST /api/commits/refresh?project=&branch=&from=&to=&metrics=&committer=
pub async fn refresh_commit_list(
    State(ctx): State<SharedContext>,
    Query(params): Query<CommitListParams>,
) -> Result<impl IntoResponse, DashboardError> {
    let query = CommitListQuery {
        from: params.from.clone(),
        to: params.to.clone(),
        metrics: params.metrics.clone(),
        committer: params.committer.clone(),
    };
    poller::refresh_commit_list(
        &ctx.store,
        &ctx.client,
        &params.project,
        params.branch.as_deref(),
        &query,
    )
    .await;
    commit_list(State(ctx), Query(params)).await
}

/// GET /api/commit?project=&id= — the stored commit detail entry (data,
/// fetch error, timestamps).
pub async fn commit_detail(
    State(ctx): State<SharedContext>,
    Query(params): Query<CommitParams>,
) -> Result<impl IntoResponse, DashboardError> {
    let entry = ctx
        .store
        .with_state(|state| state.commits.get(&params.project, &params.id).cloned())
        .await
        .ok_or_else(|| DashboardError::UnknownCommit(params.id.clone()))?;
    Ok(Json(entry))
}

/// POST /api/commit/refresh?project=&id=&branch=&batch= — fetch the
/// commit detail from the backend (epoch-guarded) and return the entry.
pub async fn refresh_commit(
    State(ctx): State<SharedContext>,
    Query(params): Query<CommitParams>,
) -> Result<impl IntoResponse, DashboardError> {
    poller::refresh_commit(
        &ctx.store,
        &ctx.client,
        &params.project,
        &params.id,
        params.branch.as_deref(),
        params.batch.as_deref(),
    )
    .await;
    commit_detail(State(ctx), Query(params)).await
}
