use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{stream, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sync_events))
}

/// Streams every published sync event as an SSE `sync` event. Slow
/// clients skip what they missed and carry on from the newest event.
async fn sync_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sync.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event("sync").json_data(&event) {
                    Ok(sse) => return Some((Ok::<_, Infallible>(sse), rx)),
                    Err(err) => warn!("failed to encode sync event: {err}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "sync subscriber lagged, skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
