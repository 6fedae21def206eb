use std::sync::Arc;

use futures::future::BoxFuture;
use redis::aio::ConnectionManager;

use crate::dao::{game_store::GameStore, storage::StorageResult};
use crate::state::game::Game;

use super::{
    config::RedisConfig,
    error::{RedisDaoError, RedisResult},
};

/// [`GameStore`] backed by Redis string values.
///
/// Each session is one JSON value under `<prefix>:<code>`; every write
/// refreshes the TTL so active sessions stay alive and idle ones expire on
/// their own.
#[derive(Clone)]
pub struct RedisGameStore {
    manager: ConnectionManager,
    key_prefix: Arc<str>,
    ttl_secs: u64,
}

impl RedisGameStore {
    /// Open a managed connection to Redis and verify it responds.
    pub async fn connect(config: RedisConfig) -> RedisResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|source| RedisDaoError::Client { source })?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|source| RedisDaoError::Client { source })?;

        let store = Self {
            manager,
            key_prefix: Arc::from(config.key_prefix.as_str()),
            ttl_secs: config.game_ttl.as_secs().max(1),
        };

        store.ping().await?;
        Ok(store)
    }

    fn game_key(&self, code: u32) -> String {
        format!("{}:{}", self.key_prefix, code)
    }

    async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|source| RedisDaoError::Command {
                command: "PING",
                source,
            })?;
        Ok(())
    }
}

impl GameStore for RedisGameStore {
    fn find_game(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut conn = store.manager.clone();
            let payload: Option<String> = redis::cmd("GET")
                .arg(store.game_key(code))
                .query_async(&mut conn)
                .await
                .map_err(|source| RedisDaoError::Command {
                    command: "GET",
                    source,
                })?;

            match payload {
                Some(json) => {
                    let game = serde_json::from_str::<Game>(&json)
                        .map_err(|source| RedisDaoError::Decode { code, source })?;
                    Ok(Some(game))
                }
                None => Ok(None),
            }
        })
    }

    fn save_game(&self, mut game: Game) -> BoxFuture<'static, StorageResult<Game>> {
        let store = self.clone();
        Box::pin(async move {
            game.revision += 1;

            let payload = serde_json::to_string(&game).map_err(|source| RedisDaoError::Encode {
                code: game.code,
                source,
            })?;

            let mut conn = store.manager.clone();
            redis::cmd("SET")
                .arg(store.game_key(game.code))
                .arg(payload)
                .arg("EX")
                .arg(store.ttl_secs)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|source| RedisDaoError::Command {
                    command: "SET",
                    source,
                })?;

            Ok(game)
        })
    }

    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut conn = store.manager.clone();
            let exists: bool = redis::cmd("EXISTS")
                .arg(store.game_key(code))
                .query_async(&mut conn)
                .await
                .map_err(|source| RedisDaoError::Command {
                    command: "EXISTS",
                    source,
                })?;
            Ok(exists)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // The connection manager re-establishes dropped connections itself;
        // a successful round-trip is the reconnect signal.
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
