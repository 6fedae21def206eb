use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::validate_player_name,
    state::{
        game::{Game, GameRound, Image, Player},
        state_machine::{GameStatus, PlayerStatus, RoundStatus},
    },
};

/// Payload used to bootstrap a brand-new game session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Number of rounds to play.
    #[validate(range(min = 1, max = 20))]
    pub rounds: u32,
    /// Expected number of players.
    #[validate(range(min = 2, max = 16))]
    pub players: u32,
}

/// Payload for joining an existing session.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    /// Display name, unique within the game.
    pub name: String,
    /// Advisory host flag.
    #[serde(default)]
    pub is_host: bool,
}

impl Validate for JoinGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(err) = validate_player_name(&self.name) {
            errors.add("name", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload carrying only the acting player's id.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerActionRequest {
    /// Acting player's id.
    pub player: Uuid,
}

/// Payload submitting or withdrawing an image pick.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ImageActionRequest {
    /// Acting player's id.
    pub player: Uuid,
    /// Image URL being submitted or withdrawn.
    #[validate(url)]
    pub url: String,
}

/// Payload casting a vote on a submission.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VoteRequest {
    /// Voting player's id.
    pub player: Uuid,
    /// Id of the image receiving the vote.
    pub image: Uuid,
}

/// Full game snapshot exposed to REST and event-stream clients. Clients
/// replace their local state wholesale with every snapshot they receive.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    /// Session code.
    pub code: u32,
    /// Live or terminal game status.
    #[schema(value_type = String)]
    pub status: GameStatus,
    /// Number of rounds in the game.
    pub total_rounds: u32,
    /// Expected player count.
    pub total_players: u32,
    /// 1-based index of the round in play.
    pub current_round: u32,
    /// Write counter for staleness detection.
    pub revision: u64,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
    /// Rounds in play order.
    pub rounds: Vec<RoundSummary>,
}

/// Public projection of one player.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Player id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Advisory host flag.
    pub is_host: bool,
    /// Lobby/round progress marker.
    #[schema(value_type = String)]
    pub status: PlayerStatus,
    /// Accumulated points.
    pub points: u32,
}

/// Public projection of one round.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    /// 1-based round position.
    pub order: u32,
    /// Current round phase.
    #[schema(value_type = String)]
    pub status: RoundStatus,
    /// Caption players illustrate this round.
    pub caption: String,
    /// URL currently on display during presentation.
    pub present_image: Option<String>,
    /// Submissions in arrival order.
    pub images: Vec<ImageSummary>,
}

/// Public projection of one submission. The voter set stays server-side.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    /// Deterministic image id.
    pub id: Uuid,
    /// Submitted URL.
    pub url: String,
    /// Submitting player's id.
    pub player_id: Uuid,
    /// Votes received.
    pub votes: u32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            is_host: player.is_host,
            status: player.status,
            points: player.points,
        }
    }
}

impl From<&Image> for ImageSummary {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id,
            url: image.url.clone(),
            player_id: image.player_id,
            votes: image.votes,
        }
    }
}

impl From<&GameRound> for RoundSummary {
    fn from(round: &GameRound) -> Self {
        Self {
            order: round.order,
            status: round.status,
            caption: round.caption.clone(),
            present_image: round.present_image.clone(),
            images: round.images.values().map(Into::into).collect(),
        }
    }
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            code: game.code,
            status: game.status,
            total_rounds: game.total_rounds,
            total_players: game.total_players,
            current_round: game.current_round,
            revision: game.revision,
            players: game.players.iter().map(Into::into).collect(),
            rounds: game.rounds.iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case_wire_names() {
        let mut game = Game::new(4321, 2, vec!["caption".into()]);
        game.players.push(Player::new("Perry".into(), true));

        let summary = GameSummary::from(&game);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["code"], 4321);
        assert_eq!(json["totalRounds"], 1);
        assert_eq!(json["totalPlayers"], 2);
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["players"][0]["isHost"], true);
        assert_eq!(json["players"][0]["status"], "JOINED");
        assert_eq!(json["rounds"][0]["status"], "NOT_STARTED");
    }

    #[test]
    fn join_request_validation_uses_name_rules() {
        let valid = JoinGameRequest {
            name: "Perry".into(),
            is_host: false,
        };
        assert!(valid.validate().is_ok());

        let blank = JoinGameRequest {
            name: "  ".into(),
            is_host: false,
        };
        assert!(blank.validate().is_err());
    }
}
