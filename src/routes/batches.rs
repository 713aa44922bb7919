use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::DashboardError;
use crate::server::SharedContext;
use crate::store::Action;
use crate::tuning::{SubmissionRecord, TuningForm};

#[derive(Deserialize)]
pub struct SubmitQuery {
    pub project: String,
    pub commit: String,
}

#[derive(Deserialize)]
pub struct TestGroupQuery {
    pub project: String,
    pub name: String,
    pub commit: String,
}

/// POST /api/batch?project=&commit= — validate the tuning form, then
/// forward it to the backend as a batch run request. Validation failures
/// come back as field-level reasons, nothing is forwarded.
pub async fn submit_batch(
    State(ctx): State<SharedContext>,
    Query(query): Query<SubmitQuery>,
    Json(form): Json<TuningForm>,
) -> Result<impl IntoResponse, DashboardError> {
    // Keep the tuning slice current with what was last attempted.
    ctx.store
        .dispatch(Action::TuningFormUpdated {
            project: query.project.clone(),
            form: form.clone(),
        })
        .await;

    let user = ctx
        .store
        .with_state(|state| state.user.settings.name.clone())
        .await;

    let errors = form.validate(user.as_deref());
    if !errors.is_empty() {
        return Err(DashboardError::Validation(errors));
    }
    let user = user.unwrap_or_default();

    let submission = form.to_submission(&user);
    let backend_response = ctx
        .client
        .submit_batch(&query.project, &query.commit, &submission)
        .await?;

    let record = SubmissionRecord::new(&query.project, &query.commit, &form.batch_label);
    let submission_id = record.id;
    info!(
        project = %query.project,
        commit = %query.commit,
        batch = %form.batch_label,
        %submission_id,
        "Batch run submitted"
    );
    ctx.store.dispatch(Action::BatchSubmitted { record }).await;

    Ok(Json(serde_json::json!({
        "submission_id": submission_id,
        "backend": backend_response,
    })))
}

/// GET /api/tests/group?project=&name=&commit= — membership of a named
/// input group, proxied from the backend for the tuning form's group
/// picker.
pub async fn test_group(
    State(ctx): State<SharedContext>,
    Query(query): Query<TestGroupQuery>,
) -> Result<impl IntoResponse, DashboardError> {
    let tests = ctx
        .client
        .test_group(&query.project, &query.name, &query.commit)
        .await?;
    Ok(Json(serde_json::json!({
        "name": query.name,
        "tests": tests,
    })))
}
