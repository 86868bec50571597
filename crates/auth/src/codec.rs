//! HS256 token issuance and verification.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use tollgate_core::SubjectId;

use crate::claims::{validate_claims, Claims, TokenError, TokenKind};
use crate::config::AuthConfig;
use crate::RoleCode;

/// Signs and verifies bearer tokens with a single shared secret.
///
/// Stateless apart from the key material; cheap to clone.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Arc<Keys>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            access_ttl: to_signed(config.access_ttl),
            refresh_ttl: to_signed(config.refresh_ttl),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue a token of `kind` living `ttl` from now.
    ///
    /// `username` and `roles` are ignored for refresh tokens. A zero or
    /// negative `ttl` yields a token that is already expired.
    pub fn issue(
        &self,
        subject: SubjectId,
        username: &str,
        roles: &[RoleCode],
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(Utc::now(), subject, username, roles, kind, ttl)
    }

    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        subject: SubjectId,
        username: &str,
        roles: &[RoleCode],
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.sign(&claims_at(now, subject, username, roles, kind, ttl))
    }

    /// Access token with the configured lifetime.
    pub fn issue_access(
        &self,
        subject: SubjectId,
        username: &str,
        roles: &[RoleCode],
    ) -> Result<String, TokenError> {
        self.issue(subject, username, roles, TokenKind::Access, self.access_ttl)
    }

    /// Refresh token with the configured lifetime.
    pub fn issue_refresh(&self, subject: SubjectId) -> Result<String, TokenError> {
        self.issue_refresh_with_expiry(subject).map(|(token, _)| token)
    }

    /// Refresh token with the configured lifetime, and the `exp` it carries.
    pub fn issue_refresh_with_expiry(
        &self,
        subject: SubjectId,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let claims = claims_at(Utc::now(), subject, "", &[], TokenKind::Refresh, self.refresh_ttl);
        let token = self.sign(&claims)?;
        Ok((token, claims.expires_at()))
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry against the local wall clock.
    ///
    /// Only the canonical token text is accepted; callers that strip a
    /// header must pass the stripped form, since the blacklist is keyed by it.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(TokenError::EmptyInput);
        }
        if trimmed.len() != token.len() {
            return Err(TokenError::Malformed("surrounding whitespace".into()));
        }

        // Expiry is checked below against `now` with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.keys.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!(error = %e, "token rejected");
                    TokenError::Malformed(e.to_string())
                }
            })?;

        let claims = data.claims;
        if claims.sub != claims.user_id.to_string() {
            return Err(TokenError::Malformed("subject mismatch".into()));
        }
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn claims_at(
    now: DateTime<Utc>,
    subject: SubjectId,
    username: &str,
    roles: &[RoleCode],
    kind: TokenKind,
    ttl: Duration,
) -> Claims {
    let iat = now.timestamp();
    let (username, roles) = match kind {
        TokenKind::Access => (Some(username.to_string()), Some(roles.to_vec())),
        TokenKind::Refresh => (None, None),
    };
    Claims {
        sub: subject.to_string(),
        user_id: subject,
        username,
        roles,
        token_type: kind,
        jti: Uuid::now_v7().to_string(),
        iat,
        exp: iat.saturating_add(ttl.num_seconds()),
    }
}

/// Saturates at `Duration::MAX` for lifetimes chrono cannot represent.
fn to_signed(ttl: std::time::Duration) -> Duration {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
