use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Caption Clash Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::player_ready,
        crate::routes::game::force_start,
        crate::routes::game::select_image,
        crate::routes::game::deselect_image,
        crate::routes::game::vote,
        crate::routes::events::game_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::PlayerActionRequest,
            crate::dto::game::ImageActionRequest,
            crate::dto::game::VoteRequest,
            crate::dto::game::GameSummary,
            crate::dto::game::PlayerSummary,
            crate::dto::game::RoundSummary,
            crate::dto::game::ImageSummary,
            crate::dto::sse::InitEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game session lifecycle operations"),
        (name = "events", description = "Server-sent event streams"),
    )
)]
pub struct ApiDoc;
