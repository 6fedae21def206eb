use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{game_store::GameStore, storage::StorageResult};
use crate::state::game::Game;

/// Process-local [`GameStore`] keeping sessions in a concurrent map.
///
/// Sessions live for the process lifetime; the arena never expires entries
/// on its own, which is fine for tests and single-instance deployments where
/// the process itself is short-lived.
#[derive(Clone, Default)]
pub struct InMemoryGameStore {
    games: Arc<DashMap<u32, Game>>,
}

impl InMemoryGameStore {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for InMemoryGameStore {
    fn find_game(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let games = self.games.clone();
        Box::pin(async move { Ok(games.get(&code).map(|entry| entry.value().clone())) })
    }

    fn save_game(&self, mut game: Game) -> BoxFuture<'static, StorageResult<Game>> {
        let games = self.games.clone();
        Box::pin(async move {
            game.revision += 1;
            games.insert(game.code, game.clone());
            Ok(game)
        })
    }

    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>> {
        let games = self.games.clone();
        Box::pin(async move { Ok(games.contains_key(&code)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_bumps_revision_and_returns_persisted_copy() {
        let store = InMemoryGameStore::new();
        let game = Game::new(1234, 2, vec!["caption".into()]);
        assert_eq!(game.revision, 0);

        let saved = store.save_game(game).await.unwrap();
        assert_eq!(saved.revision, 1);

        let saved = store.save_game(saved).await.unwrap();
        assert_eq!(saved.revision, 2);

        let found = store.find_game(1234).await.unwrap().unwrap();
        assert_eq!(found.revision, 2);
    }

    #[tokio::test]
    async fn missing_codes_are_absent() {
        let store = InMemoryGameStore::new();
        assert!(store.find_game(9999).await.unwrap().is_none());
        assert!(!store.exists(9999).await.unwrap());
    }
}
