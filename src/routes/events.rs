use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::{InitEvent, ServerEvent},
    error::{AppError, ServiceError},
    services::{
        fanout_events::{EVENT_INIT, supported_events},
        sse_service,
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/games/{code}/events",
    tag = "events",
    params(("code" = u32, Path, description = "Session code")),
    responses(
        (status = 200, description = "Event stream for the session", content_type = "text/event-stream", body = String),
        (status = 404, description = "No such game")
    )
)]
/// Stream every fanout event for a session to the connected client, starting
/// with an `init` frame listing the supported event names.
pub async fn game_events(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let store = state.require_game_store().await?;
    if !store.exists(code).await.map_err(ServiceError::from)? {
        return Err(AppError::NotFound(format!(
            "no game exists with code {code}"
        )));
    }

    let receiver = state.broker().subscribe(code);
    let init = ServerEvent::json(
        EVENT_INIT.to_string(),
        &InitEvent {
            supported_events: supported_events(),
        },
    )
    .map_err(|err| AppError::Internal(err.to_string()))?;

    info!(code, "new event stream connection");
    Ok(sse_service::to_sse_stream(receiver, init, code))
}

/// Configure the event stream endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{code}/events", get(game_events))
}
