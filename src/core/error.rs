use super::EventId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Event {0} not found")]
    NotFound(EventId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Backend-independent classification of a [`StoreError`].
///
/// The request layer maps `NotFound` to its own "not found" signal and every
/// other kind to a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Unavailable,
    Internal,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => true,
            sqlx::Error::Database(db_err) => db_err
                .code()
                .is_some_and(|code| is_transient_sqlstate(&code)),
            _ => false,
        };

        if transient {
            Self::Unavailable(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Internal(format!("migration failed: {}", err))
    }
}

/// SQLSTATE classes that describe a condition expected to clear on retry:
/// connection exceptions, serialization failures and deadlocks, resource
/// exhaustion, lock timeouts and cancelled statements.
pub(crate) fn is_transient_sqlstate(code: &str) -> bool {
    code == "55P03"
        || ["08", "40", "53", "57"]
            .iter()
            .any(|class| code.starts_with(class))
}
