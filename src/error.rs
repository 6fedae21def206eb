use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Domain errors raised by engine operations. All recoverable, surfaced to
/// the caller, never a panic. The display strings are the wire-level error
/// kinds clients match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    /// No game exists for the given session code.
    #[error("no-such-game")]
    NoSuchGame,
    /// The player id is unknown within this game.
    #[error("no-such-player")]
    NoSuchPlayer,
    /// No round is in the phase the operation requires.
    #[error("no-such-round")]
    NoSuchRound,
    /// The referenced image does not exist in the round.
    #[error("no-such-image")]
    NoSuchImage,
    /// Session code collision at creation time.
    #[error("game-exists")]
    GameExists,
    /// A player with the same name already joined.
    #[error("player-exists")]
    PlayerExists,
    /// Another round is still in a non-terminal phase.
    #[error("in-active-round")]
    InActiveRound,
    /// Every round has already been played.
    #[error("no-remaining-rounds")]
    NoRemainingRounds,
    /// The round is not in the phase the transition expects.
    #[error("bad-round-state")]
    BadRoundState,
    /// A player tried to vote for their own submission.
    #[error("own-image")]
    OwnImage,
    /// The player already cast their vote this round.
    #[error("already-voted")]
    AlreadyVoted,
}

impl From<InvalidTransition> for GameError {
    fn from(_err: InvalidTransition) -> Self {
        GameError::BadRoundState
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A domain rule rejected the operation.
    #[error(transparent)]
    Game(#[from] GameError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Game(game_err) => game_err.into(),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::NoSuchGame | GameError::NoSuchRound => AppError::NotFound(err.to_string()),
            // Unreachable given correct client sequencing, so treat it as an
            // internal consistency fault rather than caller error.
            GameError::BadRoundState => {
                warn!(kind = %err, "round state diverged from expected phase");
                AppError::Internal(err.to_string())
            }
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_kinds_use_wire_spelling() {
        assert_eq!(GameError::NoSuchGame.to_string(), "no-such-game");
        assert_eq!(GameError::PlayerExists.to_string(), "player-exists");
        assert_eq!(GameError::AlreadyVoted.to_string(), "already-voted");
        assert_eq!(GameError::OwnImage.to_string(), "own-image");
    }

    #[test]
    fn http_mapping_follows_taxonomy() {
        assert!(matches!(
            AppError::from(GameError::NoSuchGame),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(GameError::NoSuchRound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(GameError::BadRoundState),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(GameError::InActiveRound),
            AppError::BadRequest(_)
        ));
    }
}
