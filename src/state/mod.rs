pub mod game;
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig, dao::game_store::GameStore, error::ServiceError,
    services::fanout::EventBroker,
};

/// Cheaply cloneable handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Registry of per-session-code mutexes serializing engine operations.
pub type CodeLocks = DashMap<u32, Arc<Mutex<()>>>;

/// Central application state: storage handle, fanout broker, per-code lock
/// registry, and the immutable runtime configuration.
pub struct AppState {
    config: AppConfig,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    broker: Arc<dyn EventBroker>,
    code_locks: Arc<CodeLocks>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig, broker: Arc<dyn EventBroker>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            game_store: RwLock::new(None),
            broker,
            code_locks: Arc::new(DashMap::new()),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fanout broker delivering events to subscribed connections.
    pub fn broker(&self) -> &Arc<dyn EventBroker> {
        &self.broker
    }

    /// Shared per-code lock registry handed to engine instances.
    pub fn code_locks(&self) -> Arc<CodeLocks> {
        Arc::clone(&self.code_locks)
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current game store or fail with the degraded-mode error.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
