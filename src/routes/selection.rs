use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::model::{BatchRole, Selection, SortOrder, UserSettings};
use crate::server::SharedContext;
use crate::store::Action;
use crate::tuning::TuningForm;

#[derive(Deserialize)]
pub struct SelectionQuery {
    pub project: String,
}

/// The closed set of UI state changes a client may request. Anything
/// outside these variants is rejected at deserialization.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionRequest {
    SelectCommit { role: BatchRole, id: Option<String> },
    SelectBatch { role: BatchRole, label: String },
    SetFilter { role: BatchRole, filter: String },
    SetSort { sort_by: String, sort_order: SortOrder },
    SelectMetrics { keys: Vec<String> },
    SelectView { view: Option<String> },
    UpdateTuningForm { form: TuningForm },
    UpdateUser { settings: UserSettings },
}

fn to_action(project: String, request: SelectionRequest) -> Action {
    match request {
        SelectionRequest::SelectCommit { role, id } => Action::CommitSelected { project, role, id },
        SelectionRequest::SelectBatch { role, label } => Action::BatchSelected {
            project,
            role,
            label,
        },
        SelectionRequest::SetFilter { role, filter } => Action::FilterChanged {
            project,
            role,
            filter,
        },
        SelectionRequest::SetSort {
            sort_by,
            sort_order,
        } => Action::SortChanged {
            project,
            sort_by,
            sort_order,
        },
        SelectionRequest::SelectMetrics { keys } => Action::MetricsSelected { project, keys },
        SelectionRequest::SelectView { view } => Action::ViewSelected { project, view },
        SelectionRequest::UpdateTuningForm { form } => Action::TuningFormUpdated { project, form },
        SelectionRequest::UpdateUser { settings } => Action::UserUpdated { settings },
    }
}

/// POST /api/selection?project= — dispatch one selection change and
/// return the resulting selection state.
pub async fn update_selection(
    State(ctx): State<SharedContext>,
    Query(query): Query<SelectionQuery>,
    Json(request): Json<SelectionRequest>,
) -> impl IntoResponse {
    ctx.store
        .dispatch(to_action(query.project.clone(), request))
        .await;

    let selection: Selection = ctx
        .store
        .with_state(|state| {
            state
                .selected
                .entries
                .get(&query.project)
                .cloned()
                .unwrap_or_default()
        })
        .await;
    Json(selection)
}
