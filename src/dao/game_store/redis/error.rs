use thiserror::Error;

use crate::dao::storage::StorageError;

/// Result alias for the Redis DAO.
pub type RedisResult<T> = Result<T, RedisDaoError>;

/// Errors specific to the Redis session store.
#[derive(Debug, Error)]
pub enum RedisDaoError {
    /// The client could not be built from the configured URL.
    #[error("failed to open redis client: {source}")]
    Client {
        #[source]
        source: redis::RedisError,
    },
    /// A command failed against the server.
    #[error("redis {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: redis::RedisError,
    },
    /// A game record could not be serialized before the write.
    #[error("failed to encode game {code}: {source}")]
    Encode {
        code: u32,
        #[source]
        source: serde_json::Error,
    },
    /// A stored payload could not be decoded back into a game record.
    #[error("failed to decode game {code}: {source}")]
    Decode {
        code: u32,
        #[source]
        source: serde_json::Error,
    },
}

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        match err {
            RedisDaoError::Decode { code, source } => StorageError::corrupt(code, source),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
