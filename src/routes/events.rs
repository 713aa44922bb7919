use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::server::SharedContext;

/// GET /api/events — SSE stream of store-change events. Each event names
/// the slice (and project) that changed; clients re-pull the views they
/// care about. Lagged receivers skip missed events rather than erroring.
pub async fn events(
    State(ctx): State<SharedContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = ctx.store.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|event| match event {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("store").data(data)))
        }
        Err(_) => Some(Ok(Event::default().comment("lagged"))),
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
