use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tollgate_core::SubjectId;

use crate::RoleCode;

/// Which flow a token may be used for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("ACCESS"),
            TokenKind::Refresh => f.write_str("REFRESH"),
        }
    }
}

/// Signed token payload.
///
/// `username` and `roles` are only embedded in access tokens; refresh tokens
/// carry the subject alone. Timestamps are JWT-style epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject, as the decimal string of `user_id`.
    pub sub: String,

    pub user_id: SubjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleCode>>,

    pub token_type: TokenKind,

    /// Unique token id (UUIDv7).
    pub jti: String,

    pub iat: i64,

    pub exp: i64,
}

impl Claims {
    pub fn kind(&self) -> TokenKind {
        self.token_type
    }

    pub fn is_access(&self) -> bool {
        self.token_type == TokenKind::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenKind::Refresh
    }

    pub fn subject(&self) -> SubjectId {
        self.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Embedded roles, in issuance order. Empty for refresh tokens.
    pub fn roles(&self) -> &[RoleCode] {
        self.roles.as_deref().unwrap_or_default()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.iat)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.exp)
    }

    /// Time left before expiry. Negative once expired; callers must treat
    /// anything `<= 0` as invalid.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        Duration::try_seconds(self.exp.saturating_sub(now.timestamp())).unwrap_or(
            if self.exp > now.timestamp() {
                Duration::MAX
            } else {
                Duration::MIN
            },
        )
    }
}

/// Out-of-range instants clamp to the representable extreme on their side.
fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(if secs > 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    EmptyInput,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// Check the time window of decoded claims.
///
/// Signature verification happens in [`crate::TokenCodec`]; this only looks at
/// the timestamps. `exp` must be strictly in the future.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(())
}
