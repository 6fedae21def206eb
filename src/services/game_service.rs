//! The game engine: every mutation of a [`Game`] aggregate lives here.
//!
//! Each operation reads the current record from the session store, validates
//! it, mutates an in-memory copy, and persists only on success; a failed
//! validation performs no write. Operations on the same session code are
//! serialized through a per-code mutex held for the whole
//! read-validate-mutate-persist span, closing the lost-update window two
//! overlapping submissions would otherwise race through.

use std::sync::Arc;

use rand::seq::index;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    error::{GameError, ServiceError},
    services::codes,
    state::{
        CodeLocks,
        game::{Game, Image, Player},
        state_machine::{GameStatus, PlayerStatus, RoundStatus},
    },
};

/// Thin engine handle over the session store and the shared lock registry.
///
/// Construction is cheap; handlers build one per request from the shared
/// state.
pub struct GameService {
    store: Arc<dyn GameStore>,
    locks: Arc<CodeLocks>,
}

impl GameService {
    /// Bind the engine to a store and the shared per-code lock registry.
    pub fn new(store: Arc<dyn GameStore>, locks: Arc<CodeLocks>) -> Self {
        Self { store, locks }
    }

    fn lock_for(&self, code: u32) -> Arc<Mutex<()>> {
        self.locks.entry(code).or_default().clone()
    }

    async fn load(&self, code: u32) -> Result<Game, ServiceError> {
        self.store
            .find_game(code)
            .await?
            .ok_or(ServiceError::Game(GameError::NoSuchGame))
    }

    /// Run `mutate` on the current record under the code's lock, persisting
    /// the result only when it succeeds.
    async fn update<T>(
        &self,
        code: u32,
        mutate: impl FnOnce(&mut Game) -> Result<T, ServiceError>,
    ) -> Result<(Game, T), ServiceError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut game = self.load(code).await?;
        let value = mutate(&mut game)?;
        let game = self.store.save_game(game).await?;
        Ok((game, value))
    }

    /// Allocate a session and build its rounds, drawing captions without
    /// replacement from `corpus`.
    pub async fn create_game(
        &self,
        total_rounds: u32,
        total_players: u32,
        corpus: &[String],
    ) -> Result<Game, ServiceError> {
        if total_rounds == 0 {
            return Err(ServiceError::InvalidInput(
                "a game needs at least one round".into(),
            ));
        }
        if (corpus.len() as u32) < total_rounds {
            return Err(ServiceError::InvalidInput(format!(
                "caption corpus holds {} captions but {} rounds were requested",
                corpus.len(),
                total_rounds
            )));
        }

        let captions = draw_captions(corpus, total_rounds as usize);
        let code = codes::generate();

        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        if self.store.exists(code).await? {
            return Err(GameError::GameExists.into());
        }

        let game = Game::new(code, total_players, captions);
        Ok(self.store.save_game(game).await?)
    }

    /// Read-only snapshot of the current record.
    pub async fn game(&self, code: u32) -> Result<Game, ServiceError> {
        self.load(code).await
    }

    /// Add a player to the lobby, rejecting duplicate names.
    pub async fn add_player(
        &self,
        code: u32,
        name: String,
        is_host: bool,
    ) -> Result<(Game, Player), ServiceError> {
        self.update(code, move |game| {
            if game.has_player_named(&name) {
                return Err(GameError::PlayerExists.into());
            }

            let player = Player::new(name, is_host);
            game.players.push(player.clone());
            Ok(player)
        })
        .await
    }

    /// Mark a player as ready for the game to begin.
    pub async fn player_ready(&self, code: u32, player_id: Uuid) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                game.player_mut(player_id)
                    .ok_or(GameError::NoSuchPlayer)?
                    .status = PlayerStatus::Ready;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// True only when the announced roster is complete and every player is
    /// ready.
    pub async fn all_players_ready(&self, code: u32) -> Result<bool, ServiceError> {
        Ok(self.load(code).await?.all_players_ready())
    }

    /// Advance the next `NOT_STARTED` round into image selection.
    pub async fn start_new_round(&self, code: u32) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                start_round(game)?;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Host override out of the lobby: shrink the expected roster to the
    /// players actually present and start the first round.
    pub async fn force_start(&self, code: u32, player_id: Uuid) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                let player = game.player(player_id).ok_or(GameError::NoSuchPlayer)?;
                if !player.is_host {
                    return Err(ServiceError::InvalidInput(
                        "only a host can force-start the game".into(),
                    ));
                }
                if game.players.len() < 2 {
                    return Err(ServiceError::InvalidInput(
                        "at least two players are required to start".into(),
                    ));
                }

                game.total_players = game.players.len() as u32;
                start_round(game)?;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Record a player's image pick for the round in selection, replacing any
    /// earlier pick by the same player.
    pub async fn select_image(
        &self,
        code: u32,
        player_id: Uuid,
        url: String,
    ) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, move |game| {
                let round_index = game
                    .rounds
                    .iter()
                    .position(|round| round.status == RoundStatus::SelectGif)
                    .ok_or(GameError::NoSuchRound)?;

                game.player_mut(player_id)
                    .ok_or(GameError::NoSuchPlayer)?
                    .status = PlayerStatus::SelectedGif;

                let round = &mut game.rounds[round_index];
                round
                    .images
                    .retain(|_, image| image.player_id != player_id);
                let image = Image::from_url(url, player_id);
                round.images.insert(image.id, image);
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// If every player has a live submission, move the selection round into
    /// presentation. `None` when the gate is not (or no longer) open, so
    /// concurrent last submissions cannot double-start the phase.
    pub async fn complete_selection(&self, code: u32) -> Result<Option<Game>, ServiceError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut game = self.load(code).await?;
        if game.round_in(RoundStatus::SelectGif).is_none()
            || game.players.is_empty()
            || !game.all_players_in(PlayerStatus::SelectedGif)
        {
            return Ok(None);
        }

        game.advance_round(RoundStatus::SelectGif)?;
        let game = self.store.save_game(game).await?;
        Ok(Some(game))
    }

    /// Withdraw a player's submission while the round is still in selection.
    pub async fn deselect_image(
        &self,
        code: u32,
        round_order: u32,
        player_id: Uuid,
        url: &str,
    ) -> Result<Game, ServiceError> {
        let url = url.to_owned();
        let (game, ()) = self
            .update(code, move |game| {
                let round = game
                    .round_by_order_mut(round_order)
                    .ok_or(GameError::NoSuchRound)?;
                if round.status != RoundStatus::SelectGif {
                    return Err(GameError::BadRoundState.into());
                }

                let image_id = round
                    .images
                    .values()
                    .find(|image| image.player_id == player_id && image.url == url)
                    .map(|image| image.id)
                    .ok_or(GameError::NoSuchImage)?;
                round.images.shift_remove(&image_id);

                // Without a live submission the player no longer counts as
                // having selected, otherwise presentation could start with a
                // hole in it.
                if let Some(player) = game.player_mut(player_id) {
                    player.status = PlayerStatus::Ready;
                }
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// `SELECT_GIF → PRESENT`.
    pub async fn start_presentation(&self, code: u32) -> Result<Game, ServiceError> {
        self.phase_transition(code, RoundStatus::SelectGif).await
    }

    /// `PRESENT → VOTE`.
    pub async fn start_vote(&self, code: u32) -> Result<Game, ServiceError> {
        self.phase_transition(code, RoundStatus::Present).await
    }

    /// `VOTE → FINISHED`.
    pub async fn finish_round(&self, code: u32) -> Result<Game, ServiceError> {
        self.phase_transition(code, RoundStatus::Vote).await
    }

    async fn phase_transition(&self, code: u32, from: RoundStatus) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, move |game| {
                game.advance_round(from)?;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Point the presentation phase at the image currently being shown.
    pub async fn set_presented_image(
        &self,
        code: u32,
        image: &Image,
    ) -> Result<Game, ServiceError> {
        let url = image.url.clone();
        let (game, ()) = self
            .update(code, move |game| {
                let round = game
                    .round_in_mut(RoundStatus::Present)
                    .ok_or(GameError::BadRoundState)?;
                round.present_image = Some(url);
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Cast a vote on a submission in the voting round.
    pub async fn vote(
        &self,
        code: u32,
        player_id: Uuid,
        image_id: Uuid,
    ) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, move |game| {
                let round_index = game
                    .rounds
                    .iter()
                    .position(|round| round.status == RoundStatus::Vote)
                    .ok_or(GameError::BadRoundState)?;

                let submitter = game.rounds[round_index]
                    .images
                    .get(&image_id)
                    .map(|image| image.player_id)
                    .ok_or(GameError::NoSuchImage)?;
                let voter = game.player(player_id).ok_or(GameError::NoSuchPlayer)?;
                if voter.status == PlayerStatus::Voted {
                    return Err(GameError::AlreadyVoted.into());
                }
                if submitter == player_id {
                    return Err(GameError::OwnImage.into());
                }

                if let Some(image) = game.rounds[round_index].images.get_mut(&image_id) {
                    image.votes += 1;
                    image.voted_by.insert(player_id);
                }
                if let Some(player) = game.player_mut(player_id) {
                    player.status = PlayerStatus::Voted;
                }
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Add each image's votes to its submitter's running total. Must run
    /// while the round is still in `VOTE`.
    pub async fn assign_points(&self, code: u32) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                award_round_points(game)?;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// When every player has voted, tally points and close the round under a
    /// single lock acquisition. `None` when the gate is not open.
    pub async fn complete_voting(&self, code: u32) -> Result<Option<Game>, ServiceError> {
        self.finalize(code, true).await
    }

    /// Vote-timeout path: tally whatever votes exist and close the round,
    /// regardless of who is still missing. `None` when the round already
    /// moved on, making a stale timer a no-op.
    pub async fn finalize_voting(&self, code: u32) -> Result<Option<Game>, ServiceError> {
        self.finalize(code, false).await
    }

    async fn finalize(
        &self,
        code: u32,
        require_all_voted: bool,
    ) -> Result<Option<Game>, ServiceError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut game = self.load(code).await?;
        if game.round_in(RoundStatus::Vote).is_none() {
            return Ok(None);
        }
        if require_all_voted
            && (game.players.is_empty() || !game.all_players_in(PlayerStatus::Voted))
        {
            return Ok(None);
        }

        award_round_points(&mut game)?;
        game.advance_round(RoundStatus::Vote)?;
        let game = self.store.save_game(game).await?;
        Ok(Some(game))
    }

    /// Step `current_round` forward once the round at that position is done.
    pub async fn next_round(&self, code: u32) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                if game.current_round >= game.total_rounds {
                    return Err(GameError::NoSuchRound.into());
                }
                game.current_round += 1;
                Ok(())
            })
            .await?;
        Ok(game)
    }

    /// Terminal transition: no mutation is valid afterwards, only reads.
    pub async fn finish_game(&self, code: u32) -> Result<Game, ServiceError> {
        let (game, ()) = self
            .update(code, |game| {
                game.status = GameStatus::Finished;
                Ok(())
            })
            .await?;
        Ok(game)
    }
}

/// Shared gate + transition for the normal and force-start paths.
fn start_round(game: &mut Game) -> Result<(), ServiceError> {
    if game.round_in(RoundStatus::NotStarted).is_none() {
        return Err(GameError::NoRemainingRounds.into());
    }
    let round_open = game
        .rounds
        .iter()
        .any(|round| round.status != RoundStatus::NotStarted && !round.status.is_terminal());
    if round_open {
        return Err(GameError::InActiveRound.into());
    }

    game.reset_round_statuses();
    game.advance_round(RoundStatus::NotStarted)?;
    Ok(())
}

/// Credit each submission's votes to its submitter for the round in `VOTE`.
fn award_round_points(game: &mut Game) -> Result<(), GameError> {
    let round_index = game
        .rounds
        .iter()
        .position(|round| round.status == RoundStatus::Vote)
        .ok_or(GameError::BadRoundState)?;

    let tallies = game.rounds[round_index]
        .images
        .values()
        .map(|image| (image.player_id, image.votes))
        .collect::<Vec<_>>();

    for (player_id, votes) in tallies {
        if let Some(player) = game.player_mut(player_id) {
            player.points += votes;
        }
    }
    Ok(())
}

/// Draw `count` distinct captions from the corpus.
fn draw_captions(corpus: &[String], count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    index::sample(&mut rng, corpus.len(), count)
        .into_iter()
        .map(|index| corpus[index].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use dashmap::DashMap;

    use super::*;
    use crate::dao::game_store::memory::InMemoryGameStore;

    fn corpus(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("caption {i}")).collect()
    }

    fn engine() -> (GameService, InMemoryGameStore) {
        let store = InMemoryGameStore::new();
        let service = GameService::new(Arc::new(store.clone()), Arc::new(DashMap::new()));
        (service, store)
    }

    async fn two_player_game(service: &GameService) -> (u32, Uuid, Uuid) {
        let game = service.create_game(1, 2, &corpus(3)).await.unwrap();
        let code = game.code;
        let (_, p1) = service.add_player(code, "P1".into(), true).await.unwrap();
        let (_, p2) = service.add_player(code, "P2".into(), false).await.unwrap();
        service.player_ready(code, p1.id).await.unwrap();
        service.player_ready(code, p2.id).await.unwrap();
        service.start_new_round(code).await.unwrap();
        (code, p1.id, p2.id)
    }

    #[tokio::test]
    async fn create_game_draws_distinct_captions() {
        let (service, _) = engine();
        let game = service.create_game(5, 3, &corpus(8)).await.unwrap();

        assert_eq!(game.rounds.len(), 5);
        let captions = game
            .rounds
            .iter()
            .map(|round| round.caption.clone())
            .collect::<HashSet<_>>();
        assert_eq!(captions.len(), 5);
    }

    #[tokio::test]
    async fn create_game_rejects_short_corpus() {
        let (service, _) = engine();
        let err = service.create_game(5, 3, &corpus(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn duplicate_player_name_is_rejected() {
        let (service, _) = engine();
        let game = service.create_game(1, 2, &corpus(1)).await.unwrap();

        service
            .add_player(game.code, "Perry".into(), false)
            .await
            .unwrap();
        let err = service
            .add_player(game.code, "Perry".into(), false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Game(GameError::PlayerExists)
        ));
        let game = service.game(game.code).await.unwrap();
        assert_eq!(game.players.len(), 1);
    }

    #[tokio::test]
    async fn joining_unknown_code_leaves_no_trace() {
        let (service, store) = engine();
        let err = service
            .add_player(1234, "Perry".into(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Game(GameError::NoSuchGame)));
        assert!(!store.exists(1234).await.unwrap());
    }

    #[tokio::test]
    async fn reselecting_replaces_the_previous_image() {
        let (service, _) = engine();
        let (code, p1, _) = two_player_game(&service).await;

        service
            .select_image(code, p1, "https://example.com/a.gif".into())
            .await
            .unwrap();
        let game = service
            .select_image(code, p1, "https://example.com/b.gif".into())
            .await
            .unwrap();

        let round = game.round_in(RoundStatus::SelectGif).unwrap();
        let images = round
            .images
            .values()
            .filter(|image| image.player_id == p1)
            .collect::<Vec<_>>();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].url, "https://example.com/b.gif");
    }

    #[tokio::test]
    async fn deselect_removes_image_and_reopens_selection() {
        let (service, _) = engine();
        let (code, p1, _) = two_player_game(&service).await;

        service
            .select_image(code, p1, "https://example.com/a.gif".into())
            .await
            .unwrap();
        let game = service
            .deselect_image(code, 1, p1, "https://example.com/a.gif")
            .await
            .unwrap();

        let round = game.round_in(RoundStatus::SelectGif).unwrap();
        assert!(round.images.is_empty());
        assert_eq!(game.player(p1).unwrap().status, PlayerStatus::Ready);

        let err = service
            .deselect_image(code, 1, p1, "https://example.com/a.gif")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::NoSuchImage)));
    }

    #[tokio::test]
    async fn voting_guards_reject_own_image_and_double_votes() {
        let (service, _) = engine();
        let (code, p1, p2) = two_player_game(&service).await;

        service
            .select_image(code, p1, "https://example.com/a.gif".into())
            .await
            .unwrap();
        service
            .select_image(code, p2, "https://example.com/b.gif".into())
            .await
            .unwrap();
        service.complete_selection(code).await.unwrap().unwrap();
        service.start_vote(code).await.unwrap();

        let own = Image::id_for("https://example.com/a.gif");
        let err = service.vote(code, p1, own).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::OwnImage)));

        let other = Image::id_for("https://example.com/b.gif");
        service.vote(code, p1, other).await.unwrap();
        let err = service.vote(code, p1, other).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::AlreadyVoted)));
    }

    #[tokio::test]
    async fn complete_voting_waits_for_every_player() {
        let (service, _) = engine();
        let (code, p1, p2) = two_player_game(&service).await;

        service
            .select_image(code, p1, "https://example.com/a.gif".into())
            .await
            .unwrap();
        service
            .select_image(code, p2, "https://example.com/b.gif".into())
            .await
            .unwrap();
        service.complete_selection(code).await.unwrap().unwrap();
        service.start_vote(code).await.unwrap();

        service
            .vote(code, p1, Image::id_for("https://example.com/b.gif"))
            .await
            .unwrap();
        assert!(service.complete_voting(code).await.unwrap().is_none());

        service
            .vote(code, p2, Image::id_for("https://example.com/a.gif"))
            .await
            .unwrap();
        let game = service.complete_voting(code).await.unwrap().unwrap();

        assert_eq!(game.round_in(RoundStatus::Finished).unwrap().order, 1);
        assert_eq!(game.player(p1).unwrap().points, 1);
        assert_eq!(game.player(p2).unwrap().points, 1);
    }

    #[tokio::test]
    async fn finalize_voting_closes_an_incomplete_vote() {
        let (service, _) = engine();
        let (code, p1, p2) = two_player_game(&service).await;

        service
            .select_image(code, p1, "https://example.com/a.gif".into())
            .await
            .unwrap();
        service
            .select_image(code, p2, "https://example.com/b.gif".into())
            .await
            .unwrap();
        service.complete_selection(code).await.unwrap().unwrap();
        service.start_vote(code).await.unwrap();

        service
            .vote(code, p1, Image::id_for("https://example.com/b.gif"))
            .await
            .unwrap();

        let game = service.finalize_voting(code).await.unwrap().unwrap();
        assert_eq!(game.player(p2).unwrap().points, 1);

        // The timer firing again after the round closed is a no-op.
        assert!(service.finalize_voting(code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_new_round_guards() {
        let (service, _) = engine();
        let (code, _, _) = two_player_game(&service).await;

        let err = service.start_new_round(code).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::InActiveRound)
        ));
    }

    #[tokio::test]
    async fn next_round_stops_at_the_last_round() {
        let (service, _) = engine();
        let game = service.create_game(1, 2, &corpus(1)).await.unwrap();

        let err = service.next_round(game.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::NoSuchRound)));
    }

    #[tokio::test]
    async fn concurrent_selections_both_survive() {
        let (service, _) = engine();
        let service = Arc::new(service);
        let (code, p1, p2) = two_player_game(&service).await;

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .select_image(code, p1, "https://example.com/a.gif".into())
                    .await
            })
        };
        let second = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .select_image(code, p2, "https://example.com/b.gif".into())
                    .await
            })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let game = service.game(code).await.unwrap();
        let round = game.round_in(RoundStatus::SelectGif).unwrap();
        assert_eq!(round.images.len(), 2);
        assert!(
            round
                .images
                .values()
                .map(|image| image.player_id)
                .collect::<HashSet<_>>()
                .contains(&p1)
        );
    }
}
