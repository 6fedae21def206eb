use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{
        CreateGameRequest, GameSummary, ImageActionRequest, JoinGameRequest, PlayerActionRequest,
        PlayerSummary, VoteRequest,
    },
    error::AppError,
    services::game_flow,
    state::SharedState,
};

/// Routes handling the game session lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{code}", get(get_game))
        .route("/games/{code}/join", post(join_game))
        .route("/games/{code}/ready", post(player_ready))
        .route("/games/{code}/start", post(force_start))
        .route("/games/{code}/rounds/{order}/images", post(select_image))
        .route(
            "/games/{code}/rounds/{order}/images/deselect",
            post(deselect_image),
        )
        .route("/games/{code}/rounds/{order}/vote", post(vote))
}

#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameSummary)
    )
)]
/// Create a fresh game session and persist it.
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameSummary>), AppError> {
    let summary = game_flow::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "game",
    params(("code" = u32, Path, description = "Session code")),
    responses(
        (status = 200, description = "Current game snapshot", body = GameSummary),
        (status = 404, description = "No such game")
    )
)]
/// Return the current snapshot; the pull-based recovery path for clients.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
) -> Result<Json<GameSummary>, AppError> {
    let summary = game_flow::get_game(&state, code).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/games/{code}/join",
    tag = "game",
    params(("code" = u32, Path, description = "Session code")),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Player joined", body = PlayerSummary),
        (status = 400, description = "Name already taken"),
        (status = 404, description = "No such game")
    )
)]
/// Join the lobby under a unique display name.
pub async fn join_game(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<JoinGameRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    let player = game_flow::join_game(&state, code, payload).await?;
    Ok(Json(player))
}

#[utoipa::path(
    post,
    path = "/games/{code}/ready",
    tag = "game",
    params(("code" = u32, Path, description = "Session code")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Readiness recorded"),
        (status = 404, description = "No such game")
    )
)]
/// Mark a player ready; the first round starts once the roster is complete.
pub async fn player_ready(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<StatusCode, AppError> {
    game_flow::mark_ready(&state, code, payload.player).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/games/{code}/start",
    tag = "game",
    params(("code" = u32, Path, description = "Session code")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game force-started", body = GameSummary),
        (status = 400, description = "Caller is not a host")
    )
)]
/// Host override: start the game with fewer players than announced.
pub async fn force_start(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    let summary = game_flow::force_start(&state, code, payload.player).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/games/{code}/rounds/{order}/images",
    tag = "game",
    params(
        ("code" = u32, Path, description = "Session code"),
        ("order" = u32, Path, description = "Round number")
    ),
    request_body = ImageActionRequest,
    responses(
        (status = 200, description = "Image recorded", body = GameSummary),
        (status = 404, description = "No round is selecting")
    )
)]
/// Submit an image pick for the round currently in selection.
pub async fn select_image(
    State(state): State<SharedState>,
    Path((code, _order)): Path<(u32, u32)>,
    Valid(Json(payload)): Valid<Json<ImageActionRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    let summary = game_flow::submit_image(&state, code, payload.player, payload.url).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/games/{code}/rounds/{order}/images/deselect",
    tag = "game",
    params(
        ("code" = u32, Path, description = "Session code"),
        ("order" = u32, Path, description = "Round number")
    ),
    request_body = ImageActionRequest,
    responses(
        (status = 200, description = "Image withdrawn"),
        (status = 400, description = "No matching image"),
        (status = 404, description = "No such game or round")
    )
)]
/// Withdraw a previously submitted image pick.
pub async fn deselect_image(
    State(state): State<SharedState>,
    Path((code, order)): Path<(u32, u32)>,
    Valid(Json(payload)): Valid<Json<ImageActionRequest>>,
) -> Result<StatusCode, AppError> {
    game_flow::retract_image(&state, code, order, payload.player, &payload.url).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/games/{code}/rounds/{order}/vote",
    tag = "game",
    params(
        ("code" = u32, Path, description = "Session code"),
        ("order" = u32, Path, description = "Round number")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = GameSummary),
        (status = 400, description = "Vote rejected")
    )
)]
/// Cast a vote on another player's submission.
pub async fn vote(
    State(state): State<SharedState>,
    Path((code, _order)): Path<(u32, u32)>,
    Valid(Json(payload)): Valid<Json<VoteRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    let summary = game_flow::cast_vote(&state, code, payload.player, payload.image).await?;
    Ok(Json(summary))
}
