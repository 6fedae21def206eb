use std::time::Duration;

/// Default namespace prefix for session keys.
const DEFAULT_KEY_PREFIX: &str = "caption-clash:game";
/// Default quiescence window before an idle session expires.
const DEFAULT_GAME_TTL: Duration = Duration::from_secs(30 * 60);

/// Connection settings for the Redis-backed session store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (`redis://host:port`).
    pub url: String,
    /// Prefix under which game records are keyed.
    pub key_prefix: String,
    /// TTL applied on every write; expiry is the only delete path.
    pub game_ttl: Duration,
}

impl RedisConfig {
    /// Settings for `url` with the default key namespace and TTL.
    pub fn new(url: String) -> Self {
        Self {
            url,
            key_prefix: DEFAULT_KEY_PREFIX.into(),
            game_ttl: DEFAULT_GAME_TTL,
        }
    }

    /// Override the session TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.game_ttl = ttl;
        self
    }
}
