//! Event catalog and typed publication helpers.
//!
//! Every non-`init` event carries the full current game snapshot rather than
//! a diff; clients replace their local state wholesale on each event, and a
//! reconnecting client recovers through the snapshot endpoint.

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{game::GameSummary, sse::ServerEvent},
    state::{SharedState, game::Game},
};

/// Stream handshake enumerating the supported event names.
pub const EVENT_INIT: &str = "init";
/// A player joined the lobby.
pub const EVENT_PLAYER_JOINED: &str = "playerjoined";
/// A player confirmed readiness.
pub const EVENT_PLAYER_READY: &str = "playerready";
/// The full roster is ready; the game is about to begin.
pub const EVENT_GAME_READY: &str = "gameready";
/// A round entered image selection.
pub const EVENT_ROUND_STARTED: &str = "roundstarted";
/// A player submitted an image pick.
pub const EVENT_PLAYER_SELECTED_GIF: &str = "playerselectedgif";
/// A player withdrew an image pick.
pub const EVENT_PLAYER_DESELECTED_GIF: &str = "playerdeselectedgif";
/// The round moved to its next phase.
pub const EVENT_ROUND_STATE_CHANGED: &str = "roundstatechanged";
/// The presentation moved on to another image.
pub const EVENT_ROUND_IMAGE_PRESENTED: &str = "roundimagepresented";
/// A player cast their vote.
pub const EVENT_PLAYER_VOTED: &str = "playervoted";
/// The game reached its terminal state.
pub const EVENT_GAME_FINISHED: &str = "gamefinished";

/// Every event name a stream may carry, in catalog order.
pub fn supported_events() -> Vec<String> {
    [
        EVENT_INIT,
        EVENT_PLAYER_JOINED,
        EVENT_PLAYER_READY,
        EVENT_GAME_READY,
        EVENT_ROUND_STARTED,
        EVENT_PLAYER_SELECTED_GIF,
        EVENT_PLAYER_DESELECTED_GIF,
        EVENT_ROUND_STATE_CHANGED,
        EVENT_ROUND_IMAGE_PRESENTED,
        EVENT_PLAYER_VOTED,
        EVENT_GAME_FINISHED,
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Publish `event` with the game's full snapshot to every subscriber of its
/// code.
pub fn broadcast_game(state: &SharedState, event: &str, game: &Game) {
    let snapshot = GameSummary::from(game);
    send_event(state, game.code, event, &snapshot);
}

fn send_event(state: &SharedState, code: u32, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.broker().publish(code, event),
        Err(err) => warn!(event, error = %err, "failed to serialize event payload"),
    }
}
