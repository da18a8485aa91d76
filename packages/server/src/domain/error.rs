//! Domain error types.

use thiserror::Error;

/// Value Object の生成エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("session id must not be empty")]
    SessionIdEmpty,

    #[error("invalid code format")]
    InvalidJoinCodeFormat,

    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    #[error("invalid collaboration mode: {0}")]
    InvalidMode(String),
}

/// Coarse error category, used by the gateway to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; never retried internally
    Validation,
    /// The request conflicts with the current session or guest state
    Conflict,
    /// Unknown session, guest or code
    NotFound,
    /// Rate limit or lockout; carries a retry-after hint
    Throttled,
    /// The orchestrator could not complete the request (operator visible)
    Unavailable,
}

/// Errors returned by orchestrator operations.
///
/// Every failing operation leaves the session table untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("too many join attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("join attempts temporarily locked, retry after {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },

    #[error("unable to generate a unique join code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: usize },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_) => ErrorKind::Validation,
            SessionError::Conflict(_) => ErrorKind::Conflict,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::RateLimited { .. } | SessionError::LockedOut { .. } => {
                ErrorKind::Throttled
            }
            SessionError::CodeGenerationExhausted { .. } => ErrorKind::Unavailable,
        }
    }

    /// Retry-after hint in seconds for throttling errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            SessionError::RateLimited { retry_after_secs }
            | SessionError::LockedOut { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    pub(crate) fn session_not_found() -> Self {
        SessionError::NotFound("session not found".to_string())
    }

    pub(crate) fn guest_not_found() -> Self {
        SessionError::NotFound("guest not found".to_string())
    }

    pub(crate) fn session_ended() -> Self {
        SessionError::Conflict("session has ended".to_string())
    }
}

impl From<ValueObjectError> for SessionError {
    fn from(err: ValueObjectError) -> Self {
        SessionError::Validation(err.to_string())
    }
}

/// Repository（永続化）のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}
