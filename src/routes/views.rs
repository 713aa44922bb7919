use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::model::{MetricCatalog, Selection};
use crate::select::{
    select_compare_view, select_metric_catalog, select_tuning_view, CompareView, TuningView,
};
use crate::server::SharedContext;

#[derive(Deserialize)]
pub struct ViewQuery {
    pub project: String,
}

#[derive(Serialize)]
pub struct CompareResponse {
    #[serde(flatten)]
    pub view: CompareView,
    pub metrics: MetricCatalog,
    pub selection: Selection,
}

/// GET /api/view/compare?project= — the full comparison view model:
/// resolved/filtered/sorted batches with reference matches attached, the
/// effective metric catalog, and the selection that produced it.
pub async fn compare(
    State(ctx): State<SharedContext>,
    Query(query): Query<ViewQuery>,
) -> impl IntoResponse {
    let response = ctx
        .store
        .with_state(|state| {
            let selection = state
                .selected
                .entries
                .get(&query.project)
                .cloned()
                .unwrap_or_default();
            let new_commit = selection
                .new_commit_id
                .as_deref()
                .and_then(|id| state.commits.commit(&query.project, id));
            let reference_commit = selection
                .reference_commit_id
                .as_deref()
                .and_then(|id| state.commits.commit(&query.project, id));

            let view = select_compare_view(new_commit, reference_commit, &selection);
            let project_data = state
                .projects
                .entries
                .get(&query.project)
                .and_then(|entry| entry.data.as_ref());
            let metrics = select_metric_catalog(project_data, new_commit);

            CompareResponse {
                view,
                metrics,
                selection,
            }
        })
        .await;
    Json(response)
}

/// GET /api/view/tuning?project= — parameter aggregation over the
/// selected new batch, for sensitivity/parallel-coordinates plots.
pub async fn tuning(
    State(ctx): State<SharedContext>,
    Query(query): Query<ViewQuery>,
) -> Json<TuningView> {
    let view = ctx
        .store
        .with_state(|state| {
            let selection = state
                .selected
                .entries
                .get(&query.project)
                .cloned()
                .unwrap_or_default();
            let new_commit = selection
                .new_commit_id
                .as_deref()
                .and_then(|id| state.commits.commit(&query.project, id));
            select_tuning_view(new_commit, &selection)
        })
        .await;
    Json(view)
}
