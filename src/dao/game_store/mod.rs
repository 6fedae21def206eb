/// In-process store used for tests and single-instance deployments.
pub mod memory;
#[cfg(feature = "redis-store")]
/// Redis-backed store with TTL-based session expiry.
pub mod redis;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;
use crate::state::game::Game;

/// Abstraction over the persistence layer holding one [`Game`] record per
/// session code.
///
/// `save_game` bumps the record's revision counter and returns the persisted
/// copy, so callers always observe the write that actually landed. Records
/// disappear through backend TTL expiry only; there is no delete operation.
pub trait GameStore: Send + Sync {
    fn find_game(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Game>>>;
    fn save_game(&self, game: Game) -> BoxFuture<'static, StorageResult<Game>>;
    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
