use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the command.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted game record could not be decoded back into its model.
    #[error("corrupt game record for code {code}")]
    Corrupt {
        code: u32,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Construct a corrupt-record error for the given session code.
    pub fn corrupt(code: u32, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Corrupt {
            code,
            source: Box::new(source),
        }
    }
}
