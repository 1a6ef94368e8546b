/// Outcome taxonomy shared by every core operation.
///
/// `InvalidInput`, `NotFound`, `Conflict` and `Forbidden` are expected
/// business outcomes and are reported to the caller as-is. `Unavailable`
/// covers collaborator failures and timeouts (transient, safe to retry).
/// `Fatal` is a data-integrity violation: it is logged where it is raised
/// and surfaced without internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
    #[error("Integrity violation: {0}")]
    Fatal(String),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Unavailable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
