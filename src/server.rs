use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::ApiClient;
use crate::config::DashboardConfig;
use crate::store::SharedStore;

pub const BUG_REPORT_MAILTO: &str =
    "mailto:dashboard-bugs@example.com?subject=qa-dashboard%20crash%20report";

pub struct AppContext {
    pub config: DashboardConfig,
    pub store: SharedStore,
    pub client: Arc<ApiClient>,
}

pub type SharedContext = Arc<AppContext>;

pub fn build_router(ctx: SharedContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // Store snapshots + backend refresh
        .route("/api/projects", get(crate::routes::projects::projects))
        .route(
            "/api/projects/refresh",
            post(crate::routes::projects::refresh_projects),
        )
        .route("/api/branches", get(crate::routes::projects::branches))
        .route(
            "/api/branches/refresh",
            post(crate::routes::projects::refresh_branches),
        )
        .route("/api/commits", get(crate::routes::commits::commit_list))
        .route(
            "/api/commits/refresh",
            post(crate::routes::commits::refresh_commit_list),
        )
        .route("/api/commit", get(crate::routes::commits::commit_detail))
        .route(
            "/api/commit/refresh",
            post(crate::routes::commits::refresh_commit),
        )
        // Derived view models
        .route("/api/view/compare", get(crate::routes::views::compare))
        .route("/api/view/tuning", get(crate::routes::views::tuning))
        // Selection + tuning submission
        .route(
            "/api/selection",
            post(crate::routes::selection::update_selection),
        )
        .route("/api/batch", post(crate::routes::batches::submit_batch))
        .route("/api/tests/group", get(crate::routes::batches::test_group))
        // Store change stream
        .route("/api/events", get(crate::routes::events::events))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Last-resort error boundary: a handler panic becomes a static fallback
/// with a pre-filled bug-report link. Fatal for the request, not the
/// process.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    let body = serde_json::json!({
        "error": "Internal error while building the view",
        "detail": detail,
        "report": BUG_REPORT_MAILTO,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
