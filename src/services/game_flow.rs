//! Orchestration between the engine, the fanout, and the phase scheduler.
//!
//! Flows translate one client action into engine operations, publish the
//! resulting snapshots, and arm the timers that advance a session without
//! further client action. Timer callbacks re-check game state when they fire
//! and log-and-drop anything stale; no client request is pending by then.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::game::{CreateGameRequest, GameSummary, JoinGameRequest, PlayerSummary},
    error::{GameError, ServiceError},
    services::{
        fanout_events::{
            EVENT_GAME_FINISHED, EVENT_GAME_READY, EVENT_PLAYER_DESELECTED_GIF,
            EVENT_PLAYER_JOINED, EVENT_PLAYER_READY, EVENT_PLAYER_SELECTED_GIF,
            EVENT_PLAYER_VOTED, EVENT_ROUND_IMAGE_PRESENTED, EVENT_ROUND_STARTED,
            EVENT_ROUND_STATE_CHANGED, broadcast_game,
        },
        game_service::GameService,
        scheduler,
    },
    state::{
        SharedState,
        game::{Game, Image},
        state_machine::{GameStatus, RoundStatus},
    },
};

/// Bind an engine instance to the currently installed store.
async fn engine(state: &SharedState) -> Result<GameService, ServiceError> {
    Ok(GameService::new(
        state.require_game_store().await?,
        state.code_locks(),
    ))
}

/// Create a fresh session with rounds drawn from the caption corpus.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let engine = engine(state).await?;
    let game = engine
        .create_game(request.rounds, request.players, state.config().captions())
        .await?;
    Ok(GameSummary::from(&game))
}

/// Read the current snapshot; the recovery path for reconnecting clients.
pub async fn get_game(state: &SharedState, code: u32) -> Result<GameSummary, ServiceError> {
    let engine = engine(state).await?;
    let game = engine.game(code).await?;
    Ok(GameSummary::from(&game))
}

/// Add a player to the lobby and tell everyone about it.
pub async fn join_game(
    state: &SharedState,
    code: u32,
    request: JoinGameRequest,
) -> Result<PlayerSummary, ServiceError> {
    let engine = engine(state).await?;
    let (game, player) = engine.add_player(code, request.name, request.is_host).await?;
    broadcast_game(state, EVENT_PLAYER_JOINED, &game);
    Ok(PlayerSummary::from(&player))
}

/// Mark a player ready; once the full roster is ready the first round starts
/// on its own.
pub async fn mark_ready(
    state: &SharedState,
    code: u32,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    let engine = engine(state).await?;
    let game = engine.player_ready(code, player_id).await?;
    broadcast_game(state, EVENT_PLAYER_READY, &game);

    if game.all_players_ready() {
        broadcast_game(state, EVENT_GAME_READY, &game);
        match engine.start_new_round(code).await {
            Ok(game) => broadcast_game(state, EVENT_ROUND_STARTED, &game),
            // A concurrent last ready already started the round.
            Err(ServiceError::Game(GameError::InActiveRound)) => {
                debug!(code, "round already started by a concurrent ready");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Host override out of the lobby with fewer players than announced.
pub async fn force_start(
    state: &SharedState,
    code: u32,
    player_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let engine = engine(state).await?;
    let game = engine.force_start(code, player_id).await?;
    broadcast_game(state, EVENT_GAME_READY, &game);
    broadcast_game(state, EVENT_ROUND_STARTED, &game);
    Ok(GameSummary::from(&game))
}

/// Record an image pick; the last pick moves the round into presentation and
/// arms the per-image timers.
pub async fn submit_image(
    state: &SharedState,
    code: u32,
    player_id: Uuid,
    url: String,
) -> Result<GameSummary, ServiceError> {
    let engine = engine(state).await?;
    let game = engine.select_image(code, player_id, url).await?;
    broadcast_game(state, EVENT_PLAYER_SELECTED_GIF, &game);

    if let Some(presenting) = engine.complete_selection(code).await? {
        broadcast_game(state, EVENT_ROUND_STATE_CHANGED, &presenting);
        arm_presentation(state, &presenting);
    }

    Ok(GameSummary::from(&game))
}

/// Withdraw an image pick while the round is still in selection.
pub async fn retract_image(
    state: &SharedState,
    code: u32,
    round_order: u32,
    player_id: Uuid,
    url: &str,
) -> Result<(), ServiceError> {
    let engine = engine(state).await?;
    let game = engine.deselect_image(code, round_order, player_id, url).await?;
    broadcast_game(state, EVENT_PLAYER_DESELECTED_GIF, &game);
    Ok(())
}

/// Cast a vote; the last vote tallies points, closes the round, and arms the
/// inter-round pause.
pub async fn cast_vote(
    state: &SharedState,
    code: u32,
    player_id: Uuid,
    image_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let engine = engine(state).await?;
    let game = engine.vote(code, player_id, image_id).await?;
    broadcast_game(state, EVENT_PLAYER_VOTED, &game);

    if let Some(finished) = engine.complete_voting(code).await? {
        broadcast_game(state, EVENT_ROUND_STATE_CHANGED, &finished);
        arm_round_gap(state, code);
    }

    Ok(GameSummary::from(&game))
}

/// Arm one "show image i" timer per submission at `dwell × i`, plus the
/// "open the vote" timer at `dwell × N`.
fn arm_presentation(state: &SharedState, game: &Game) {
    let Some(round) = game.round_in(RoundStatus::Present) else {
        return;
    };

    let dwell = state.config().present_dwell;
    let code = game.code;
    let images = round.images.values().cloned().collect::<Vec<_>>();
    let count = images.len() as u32;

    for (index, image) in images.into_iter().enumerate() {
        let state = state.clone();
        scheduler::after(dwell * index as u32, async move {
            present_image_step(state, code, image).await;
        });
    }

    let state = state.clone();
    scheduler::after(dwell * count, async move {
        open_vote(state, code).await;
    });
}

/// Presentation timer body: point the round at the next image.
async fn present_image_step(state: SharedState, code: u32, image: Image) {
    let engine = match engine(&state).await {
        Ok(engine) => engine,
        Err(err) => {
            warn!(code, error = %err, "presentation timer without storage; dropping");
            return;
        }
    };

    match engine.set_presented_image(code, &image).await {
        Ok(game) => broadcast_game(&state, EVENT_ROUND_IMAGE_PRESENTED, &game),
        Err(err) => debug!(code, error = %err, "presentation timer fired on stale state"),
    }
}

/// Vote-opening timer body: move `PRESENT → VOTE` and arm the vote deadline.
async fn open_vote(state: SharedState, code: u32) {
    let engine = match engine(&state).await {
        Ok(engine) => engine,
        Err(err) => {
            warn!(code, error = %err, "vote timer without storage; dropping");
            return;
        }
    };

    match engine.start_vote(code).await {
        Ok(game) => {
            broadcast_game(&state, EVENT_ROUND_STATE_CHANGED, &game);
            let deadline = state.config().vote_timeout;
            scheduler::after(deadline, async move {
                vote_deadline(state, code).await;
            });
        }
        Err(err) => debug!(code, error = %err, "vote timer fired on stale state"),
    }
}

/// Vote-deadline timer body: close the round with whatever votes were cast.
/// A no-op when the players already finished the vote themselves.
async fn vote_deadline(state: SharedState, code: u32) {
    let engine = match engine(&state).await {
        Ok(engine) => engine,
        Err(err) => {
            warn!(code, error = %err, "vote deadline without storage; dropping");
            return;
        }
    };

    match engine.finalize_voting(code).await {
        Ok(Some(game)) => {
            broadcast_game(&state, EVENT_ROUND_STATE_CHANGED, &game);
            arm_round_gap(&state, code);
        }
        Ok(None) => {}
        Err(err) => warn!(code, error = %err, "vote deadline failed; dropping"),
    }
}

/// Pause between rounds, then either start the next round or finish the game.
fn arm_round_gap(state: &SharedState, code: u32) {
    let delay = state.config().round_gap;
    let state = state.clone();
    scheduler::after(delay, async move {
        advance_or_finish(state, code).await;
    });
}

/// Round-gap timer body: self-validates against current state before acting.
async fn advance_or_finish(state: SharedState, code: u32) {
    let engine = match engine(&state).await {
        Ok(engine) => engine,
        Err(err) => {
            warn!(code, error = %err, "round gap timer without storage; dropping");
            return;
        }
    };

    let game = match engine.game(code).await {
        Ok(game) => game,
        Err(err) => {
            debug!(code, error = %err, "round gap timer on missing game; dropping");
            return;
        }
    };

    if game.status == GameStatus::Finished {
        return;
    }
    // Only act when the round the pause was armed for is actually closed.
    let current_closed = game
        .rounds
        .get(game.current_round as usize - 1)
        .is_some_and(|round| round.status == RoundStatus::Finished);
    if !current_closed {
        return;
    }

    if game.current_round >= game.total_rounds {
        match engine.finish_game(code).await {
            Ok(game) => broadcast_game(&state, EVENT_GAME_FINISHED, &game),
            Err(err) => warn!(code, error = %err, "failed to finish game; dropping"),
        }
        return;
    }

    if let Err(err) = engine.next_round(code).await {
        warn!(code, error = %err, "failed to advance round counter; dropping");
        return;
    }
    match engine.start_new_round(code).await {
        Ok(game) => broadcast_game(&state, EVENT_ROUND_STARTED, &game),
        Err(err) => warn!(code, error = %err, "failed to start next round; dropping"),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::InMemoryGameStore,
        dto::sse::ServerEvent,
        services::fanout::LocalBroker,
        state::{AppState, state_machine::PlayerStatus},
    };

    const DWELL: Duration = Duration::from_millis(50);
    const GAP: Duration = Duration::from_millis(100);
    const DEADLINE: Duration = Duration::from_secs(60);

    async fn test_state() -> SharedState {
        let config = AppConfig::default().with_timings(DWELL, GAP, DEADLINE);
        let state = AppState::new(config, Arc::new(LocalBroker::new(64)));
        state
            .install_game_store(Arc::new(InMemoryGameStore::new()))
            .await;
        state
    }

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<ServerEvent>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let Some(name) = event.event {
                names.push(name);
            }
        }
        names
    }

    #[tokio::test(start_paused = true)]
    async fn full_single_round_game_runs_to_completion() {
        let state = test_state().await;

        let created = create_game(&state, CreateGameRequest { rounds: 1, players: 2 })
            .await
            .unwrap();
        let code = created.code;
        let mut events = state.broker().subscribe(code);

        let p1 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P1".into(), is_host: true },
        )
        .await
        .unwrap();
        let p2 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P2".into(), is_host: false },
        )
        .await
        .unwrap();

        mark_ready(&state, code, p1.id).await.unwrap();
        mark_ready(&state, code, p2.id).await.unwrap();

        // Both ready: the engine auto-started round 1 into selection.
        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.rounds[0].status, RoundStatus::SelectGif);

        let url_a = "https://example.com/a.gif";
        let url_b = "https://example.com/b.gif";
        submit_image(&state, code, p1.id, url_a.into()).await.unwrap();
        submit_image(&state, code, p2.id, url_b.into()).await.unwrap();

        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.rounds[0].status, RoundStatus::Present);

        // Let both per-image timers and the vote-opening timer fire.
        sleep(DWELL * 3).await;

        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.rounds[0].status, RoundStatus::Vote);
        assert!(game.rounds[0].present_image.is_some());

        cast_vote(&state, code, p1.id, Image::id_for(url_b))
            .await
            .unwrap();
        cast_vote(&state, code, p2.id, Image::id_for(url_a))
            .await
            .unwrap();

        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.rounds[0].status, RoundStatus::Finished);
        for player in &game.players {
            assert_eq!(player.points, 1);
            assert_eq!(player.status, PlayerStatus::Voted);
        }
        for round in &game.rounds {
            for image in &round.images {
                assert_eq!(image.votes, 1);
            }
        }

        // Last round: the inter-round pause finishes the game.
        sleep(GAP * 2).await;
        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.status, GameStatus::Finished);

        let names = drain(&mut events);
        for expected in [
            "playerjoined",
            "playerready",
            "gameready",
            "roundstarted",
            "playerselectedgif",
            "roundstatechanged",
            "roundimagepresented",
            "playervoted",
            "gamefinished",
        ] {
            assert!(
                names.iter().any(|name| name == expected),
                "missing event {expected} in {names:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_round_game_moves_to_the_next_round_after_the_gap() {
        let state = test_state().await;

        let created = create_game(&state, CreateGameRequest { rounds: 2, players: 2 })
            .await
            .unwrap();
        let code = created.code;

        let p1 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P1".into(), is_host: true },
        )
        .await
        .unwrap();
        let p2 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P2".into(), is_host: false },
        )
        .await
        .unwrap();
        mark_ready(&state, code, p1.id).await.unwrap();
        mark_ready(&state, code, p2.id).await.unwrap();

        let url_a = "https://example.com/a.gif";
        let url_b = "https://example.com/b.gif";
        submit_image(&state, code, p1.id, url_a.into()).await.unwrap();
        submit_image(&state, code, p2.id, url_b.into()).await.unwrap();
        sleep(DWELL * 3).await;
        cast_vote(&state, code, p1.id, Image::id_for(url_b))
            .await
            .unwrap();
        cast_vote(&state, code, p2.id, Image::id_for(url_a))
            .await
            .unwrap();

        sleep(GAP * 2).await;

        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.current_round, 2);
        assert_eq!(game.rounds[0].status, RoundStatus::Finished);
        assert_eq!(game.rounds[1].status, RoundStatus::SelectGif);
        // Per-round statuses reset for the new round.
        for player in &game.players {
            assert_eq!(player.status, PlayerStatus::Ready);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn vote_deadline_finalizes_a_stalled_vote() {
        let state = test_state().await;

        let created = create_game(&state, CreateGameRequest { rounds: 1, players: 2 })
            .await
            .unwrap();
        let code = created.code;

        let p1 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P1".into(), is_host: true },
        )
        .await
        .unwrap();
        let p2 = join_game(
            &state,
            code,
            JoinGameRequest { name: "P2".into(), is_host: false },
        )
        .await
        .unwrap();
        mark_ready(&state, code, p1.id).await.unwrap();
        mark_ready(&state, code, p2.id).await.unwrap();

        let url_a = "https://example.com/a.gif";
        let url_b = "https://example.com/b.gif";
        submit_image(&state, code, p1.id, url_a.into()).await.unwrap();
        submit_image(&state, code, p2.id, url_b.into()).await.unwrap();
        sleep(DWELL * 3).await;

        // Only one player votes; the deadline closes the round anyway.
        cast_vote(&state, code, p1.id, Image::id_for(url_b))
            .await
            .unwrap();
        sleep(DEADLINE + GAP * 2).await;

        let game = get_game(&state, code).await.unwrap();
        assert_eq!(game.status, GameStatus::Finished);
        let submitter_b = game
            .players
            .iter()
            .find(|player| player.id == p2.id)
            .unwrap();
        assert_eq!(submitter_b.points, 1);
    }

    #[tokio::test]
    async fn force_start_shrinks_the_roster_and_begins_round_one() {
        let state = test_state().await;

        let created = create_game(&state, CreateGameRequest { rounds: 1, players: 4 })
            .await
            .unwrap();
        let code = created.code;

        let host = join_game(
            &state,
            code,
            JoinGameRequest { name: "host".into(), is_host: true },
        )
        .await
        .unwrap();
        let guest = join_game(
            &state,
            code,
            JoinGameRequest { name: "guest".into(), is_host: false },
        )
        .await
        .unwrap();

        let err = force_start(&state, code, guest.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let game = force_start(&state, code, host.id).await.unwrap();
        assert_eq!(game.total_players, 2);
        assert_eq!(game.rounds[0].status, RoundStatus::SelectGif);
    }
}
