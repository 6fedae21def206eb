use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GameError;
use crate::state::state_machine::{GameStatus, PlayerStatus, RoundStatus};

/// One participant in a game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Session-unique identifier assigned on join.
    pub id: Uuid,
    /// Display name, unique within the game.
    pub name: String,
    /// Advisory host flag; more than one player may carry it.
    pub is_host: bool,
    /// Lobby/round progress marker.
    pub status: PlayerStatus,
    /// Points accumulated across rounds, never decreasing.
    pub points: u32,
}

impl Player {
    /// Create a freshly joined player.
    pub fn new(name: String, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            is_host,
            status: PlayerStatus::Joined,
            points: 0,
        }
    }
}

/// A single image submission within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Deterministic id derived from the URL, so resubmitting the same URL
    /// yields the same id.
    pub id: Uuid,
    /// The submitted image URL.
    pub url: String,
    /// Who submitted it.
    pub player_id: Uuid,
    /// Number of votes received this round.
    pub votes: u32,
    /// Players who voted for this image; guards against double counting.
    pub voted_by: HashSet<Uuid>,
}

impl Image {
    /// Build a submission for `url`, deriving the stable id from the URL
    /// itself.
    pub fn from_url(url: String, player_id: Uuid) -> Self {
        Self {
            id: Self::id_for(&url),
            url,
            player_id,
            votes: 0,
            voted_by: HashSet::new(),
        }
    }

    /// Deterministic id for a URL (UUIDv5 in the URL namespace).
    pub fn id_for(url: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes())
    }
}

/// One caption-and-image cycle within a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    /// 1-based position within the game, immutable.
    pub order: u32,
    /// Current phase of the round.
    pub status: RoundStatus,
    /// Caption assigned at game creation, distinct per round.
    pub caption: String,
    /// Live submissions keyed by image id, one per player at most.
    pub images: IndexMap<Uuid, Image>,
    /// URL currently shown while the round is in the presentation phase.
    pub present_image: Option<String>,
}

impl GameRound {
    fn new(order: u32, caption: String) -> Self {
        Self {
            order,
            status: RoundStatus::NotStarted,
            caption,
            images: IndexMap::new(),
            present_image: None,
        }
    }
}

/// Authoritative state of one game session. Mutated exclusively through the
/// engine and persisted wholesale on every successful operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Short numeric session code.
    pub code: u32,
    /// Live or terminal.
    pub status: GameStatus,
    /// Number of rounds fixed at creation.
    pub total_rounds: u32,
    /// Expected player count; shrinks when a host force-starts.
    pub total_players: u32,
    /// 1-based index of the round currently in play.
    pub current_round: u32,
    /// All rounds, ordered, length `total_rounds`.
    pub rounds: Vec<GameRound>,
    /// Participants in join order, unique by name.
    pub players: Vec<Player>,
    /// Write counter bumped by the store on every persisted mutation.
    pub revision: u64,
}

impl Game {
    /// Build a fresh game with one round per caption, all rounds
    /// `NOT_STARTED` and no players.
    pub fn new(code: u32, total_players: u32, captions: Vec<String>) -> Self {
        let rounds = captions
            .into_iter()
            .enumerate()
            .map(|(index, caption)| GameRound::new(index as u32 + 1, caption))
            .collect::<Vec<_>>();

        Self {
            code,
            status: GameStatus::Active,
            total_rounds: rounds.len() as u32,
            total_players,
            current_round: 1,
            rounds,
            players: Vec::new(),
            revision: 0,
        }
    }

    /// Look up a player by id.
    pub fn player(&self, player_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }

    /// Look up a player by id, mutably.
    pub fn player_mut(&mut self, player_id: Uuid) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.id == player_id)
    }

    /// Whether any player already uses `name` (case-sensitive).
    pub fn has_player_named(&self, name: &str) -> bool {
        self.players.iter().any(|player| player.name == name)
    }

    /// The round currently in `status`, if any.
    pub fn round_in(&self, status: RoundStatus) -> Option<&GameRound> {
        self.rounds.iter().find(|round| round.status == status)
    }

    /// The round currently in `status`, mutably.
    pub fn round_in_mut(&mut self, status: RoundStatus) -> Option<&mut GameRound> {
        self.rounds.iter_mut().find(|round| round.status == status)
    }

    /// Round addressed by its 1-based order.
    pub fn round_by_order_mut(&mut self, order: u32) -> Option<&mut GameRound> {
        self.rounds.iter_mut().find(|round| round.order == order)
    }

    /// True when every player currently holds `status`.
    pub fn all_players_in(&self, status: PlayerStatus) -> bool {
        self.players.iter().all(|player| player.status == status)
    }

    /// Normal lobby-exit gate: the announced roster is complete and every
    /// player confirmed readiness.
    pub fn all_players_ready(&self) -> bool {
        self.total_players as usize == self.players.len()
            && self.all_players_in(PlayerStatus::Ready)
    }

    /// Advance the round currently in `from` to its successor phase.
    ///
    /// Fails with `bad-round-state` when no round is in `from`; advancing a
    /// terminal phase is unreachable because `Finished` rounds are excluded
    /// by the lookup.
    pub fn advance_round(&mut self, from: RoundStatus) -> Result<&mut GameRound, GameError> {
        let round = self
            .round_in_mut(from)
            .ok_or(GameError::BadRoundState)?;
        round.status = from.advance()?;
        Ok(round)
    }

    /// Reset every per-round player status back to the `Ready` baseline,
    /// keeping lobby statuses untouched.
    pub fn reset_round_statuses(&mut self) {
        for player in &mut self.players {
            if player.status.is_round_scoped() {
                player.status = PlayerStatus::Ready;
            }
        }
    }
}
