use thiserror::Error;

#[derive(Error, Debug)]
pub enum StsKeepError {
    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Credential already exists: {0}")]
    AlreadyExists(String),

    #[error("Session token credential '{0}' has no parent credential to refresh from")]
    MissingParent(String),

    #[error("Credential '{0}' is not a session token credential")]
    NotSessionToken(String),

    #[error("STS exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Audit chain integrity violation at entry {0}")]
    AuditChainBroken(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure of a single assume-role round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request denied: {0}")]
    Denied(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request timed out")]
    Timeout,
}

impl ExchangeError {
    /// Whether a later attempt may succeed without any change to the inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl StsKeepError {
    /// Return a string error code identifier.
    pub fn error_code(&self) -> &'static str {
        match self {
            StsKeepError::NotFound(_) => "not_found",
            StsKeepError::AlreadyExists(_) => "already_exists",
            StsKeepError::MissingParent(_) => "missing_parent",
            StsKeepError::NotSessionToken(_) => "not_session_token",
            StsKeepError::Exchange(_) => "exchange_error",
            StsKeepError::Store(_) => "store_error",
            StsKeepError::InvalidConfig(_) => "invalid_config",
            StsKeepError::Serialization(_) => "serialization_error",
            StsKeepError::AuditChainBroken(_) => "audit_chain_broken",
            StsKeepError::Io(_) => "io_error",
            StsKeepError::Other(_) => "error",
        }
    }

    /// True for failures that a hosting layer should treat as a miss rather than a fault.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            StsKeepError::NotFound(_)
                | StsKeepError::MissingParent(_)
                | StsKeepError::Exchange(_)
                | StsKeepError::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StsKeepError>;
