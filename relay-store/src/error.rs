use relay_core::CoreError;
use thiserror::Error;

/// `lock_not_available`, raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// `query_canceled`, raised when `statement_timeout` expires
const QUERY_CANCELED: &str = "57014";

/// Failures of the storage and network adapters, before they are folded
/// into the core taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("Location service error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Location service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Timed out after {0} seconds")]
    Timeout(u64),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Lock wait or statement timeouts. The transaction is rolled back and
    /// the request may be retried.
    fn is_timeout(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .is_some_and(|code| code == LOCK_NOT_AVAILABLE || code == QUERY_CANCELED),
            _ => false,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        if err.is_unique_violation() {
            return CoreError::Conflict(err.to_string());
        }
        if err.is_timeout() {
            return CoreError::Unavailable(err.to_string());
        }
        match err {
            StoreError::Database(sqlx::Error::PoolTimedOut)
            | StoreError::Database(sqlx::Error::Io(_))
            | StoreError::Cache(_)
            | StoreError::Timeout(_) => CoreError::Unavailable(err.to_string()),
            StoreError::Http(ref e) if e.is_timeout() || e.is_connect() => CoreError::Unavailable(err.to_string()),
            StoreError::Upstream { status, .. } if status == 404 || status == 422 => {
                CoreError::invalid(format!("address could not be located: {}", err))
            }
            StoreError::Upstream { .. } | StoreError::Http(_) => CoreError::Unavailable(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => CoreError::Fatal(err.to_string()),
        }
    }
}

pub(crate) fn db(err: sqlx::Error) -> CoreError {
    StoreError::from(err).into()
}
