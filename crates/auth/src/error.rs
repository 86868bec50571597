//! Failure taxonomy surfaced to callers of the auth core.

use thiserror::Error;

use tollgate_core::StoreError;

use crate::claims::TokenError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required field was blank.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed, wrongly signed, revoked or superseded token.
    #[error("token invalid: {0}")]
    TokenInvalid(String),

    /// Well-formed token past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Bad credentials or disabled account.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No identity is bound where one is required.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The bound identity lacks every accepted authority.
    #[error("forbidden: requires any of [{0}]")]
    AuthorizationDenied(String),

    /// A collaborator failed; propagated as-is.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn token_invalid(msg: impl Into<String>) -> Self {
        Self::TokenInvalid(msg.into())
    }

    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// `TokenExpired` folded into `TokenInvalid`, for callers that do not
    /// care about the distinction.
    pub fn is_token_failure(&self) -> bool {
        matches!(self, Self::TokenInvalid(_) | Self::TokenExpired)
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => Self::TokenExpired,
            TokenError::EmptyInput => Self::TokenInvalid("token is empty".into()),
            TokenError::Malformed(msg) => Self::TokenInvalid(msg),
            TokenError::Signing(msg) => Self::TokenInvalid(format!("signing failed: {msg}")),
        }
    }
}
