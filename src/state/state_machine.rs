use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a game is still accepting play or has reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// The session is live and rounds can progress.
    Active,
    /// All rounds are done; only reads are valid from here on.
    Finished,
}

/// Phase of a single round. Progression is strictly linear and never skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Round exists but has not begun.
    NotStarted,
    /// Players are picking an image for the round caption.
    SelectGif,
    /// Submitted images are shown one at a time.
    Present,
    /// Players vote on each other's submissions.
    Vote,
    /// Votes are tallied and the round is closed.
    Finished,
}

/// Per-player lifecycle status. `Joined`/`Ready` gate the lobby; the
/// remaining values track progress within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    /// Player has joined the lobby but not confirmed readiness.
    Joined,
    /// Player confirmed readiness (also the between-rounds baseline).
    Ready,
    /// Player has a live image submission in the current round.
    SelectedGif,
    /// Player has cast their vote in the current round.
    Voted,
}

/// Error returned when a round is asked to move somewhere other than its
/// direct successor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid round transition: {from:?} cannot advance")]
pub struct InvalidTransition {
    /// Phase the round was in when the invalid advance was requested.
    pub from: RoundStatus,
}

impl RoundStatus {
    /// The phase that directly follows this one, if any.
    pub fn successor(self) -> Option<RoundStatus> {
        match self {
            RoundStatus::NotStarted => Some(RoundStatus::SelectGif),
            RoundStatus::SelectGif => Some(RoundStatus::Present),
            RoundStatus::Present => Some(RoundStatus::Vote),
            RoundStatus::Vote => Some(RoundStatus::Finished),
            RoundStatus::Finished => None,
        }
    }

    /// Advance to the next phase, rejecting any attempt to move past the
    /// terminal phase.
    pub fn advance(self) -> Result<RoundStatus, InvalidTransition> {
        self.successor().ok_or(InvalidTransition { from: self })
    }

    /// True once the round can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundStatus::Finished)
    }
}

impl PlayerStatus {
    /// True for the statuses that only make sense within one round and must
    /// be reset when the next round starts.
    pub fn is_round_scoped(self) -> bool {
        matches!(self, PlayerStatus::SelectedGif | PlayerStatus::Voted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_progress_in_fixed_order() {
        let order = [
            RoundStatus::NotStarted,
            RoundStatus::SelectGif,
            RoundStatus::Present,
            RoundStatus::Vote,
            RoundStatus::Finished,
        ];

        let mut status = RoundStatus::NotStarted;
        for expected in order.iter().skip(1) {
            status = status.advance().unwrap();
            assert_eq!(status, *expected);
        }
    }

    #[test]
    fn finished_round_cannot_advance() {
        let err = RoundStatus::Finished.advance().unwrap_err();
        assert_eq!(err.from, RoundStatus::Finished);
    }

    #[test]
    fn no_phase_is_skippable() {
        // Every non-terminal phase has exactly one successor, so no sequence
        // of advances can jump over a phase.
        assert_eq!(
            RoundStatus::NotStarted.successor(),
            Some(RoundStatus::SelectGif)
        );
        assert_eq!(
            RoundStatus::SelectGif.successor(),
            Some(RoundStatus::Present)
        );
        assert_eq!(RoundStatus::Present.successor(), Some(RoundStatus::Vote));
        assert_eq!(RoundStatus::Vote.successor(), Some(RoundStatus::Finished));
        assert_eq!(RoundStatus::Finished.successor(), None);
    }

    #[test]
    fn round_scoped_statuses() {
        assert!(PlayerStatus::SelectedGif.is_round_scoped());
        assert!(PlayerStatus::Voted.is_round_scoped());
        assert!(!PlayerStatus::Joined.is_round_scoped());
        assert!(!PlayerStatus::Ready.is_round_scoped());
    }
}
