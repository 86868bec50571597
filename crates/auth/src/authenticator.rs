//! Per-request bearer authentication.
//!
//! The authenticator never aborts a request because of a bad token: it
//! returns [`AuthOutcome::PassThrough`] and leaves the reject decision to
//! route-level authorization. Only collaborator faults surface as errors.

use crate::{
    AuthError, AuthorizationResolver, Principal, RevocationRegistry, TokenCodec, TokenError,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request proceeds without a bound identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassThroughReason {
    /// No `Authorization` header, or not a bearer credential.
    NoCredentials,
    /// Signature, structure or expiry check failed.
    InvalidToken(TokenError),
    /// Token is on the blacklist.
    Revoked,
    /// A refresh token was presented as a bearer credential.
    WrongTokenKind,
    /// The token's username no longer resolves to the account it was
    /// issued for.
    UnknownSubject,
    /// The account exists but is disabled.
    Disabled,
}

/// Immutable result of authenticating one request; thread it through the
/// handlers that need the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Bound(Principal),
    PassThrough(PassThroughReason),
}

impl AuthOutcome {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthOutcome::Bound(principal) => Some(principal),
            AuthOutcome::PassThrough(_) => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, AuthOutcome::Bound(_))
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Returns `None` for a missing header, a non-bearer scheme, or an empty
/// token.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    codec: TokenCodec,
    registry: RevocationRegistry,
    resolver: AuthorizationResolver,
}

impl RequestAuthenticator {
    pub fn new(
        codec: TokenCodec,
        registry: RevocationRegistry,
        resolver: AuthorizationResolver,
    ) -> Self {
        Self {
            codec,
            registry,
            resolver,
        }
    }

    /// Run the gates for one request given its raw `Authorization` header.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthOutcome, AuthError> {
        let Some(token) = extract_bearer(authorization) else {
            return Ok(AuthOutcome::PassThrough(PassThroughReason::NoCredentials));
        };
        self.authenticate_token(token).await
    }

    /// Run the gates for an already extracted bearer token.
    ///
    /// `token` must be the bare token text; padded input is rejected as
    /// malformed rather than trimmed.
    pub async fn authenticate_token(&self, token: &str) -> Result<AuthOutcome, AuthError> {
        let claims = match self.codec.validate(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "bearer token rejected");
                return Ok(pass(PassThroughReason::InvalidToken(e)));
            }
        };

        let subject = claims.subject();
        if self.registry.is_revoked(token)? {
            tracing::warn!(%subject, "revoked bearer token presented");
            return Ok(pass(PassThroughReason::Revoked));
        }

        let Some(username) = claims.username().filter(|_| claims.is_access()) else {
            tracing::warn!(%subject, kind = %claims.kind(), "non-access token presented as bearer");
            return Ok(pass(PassThroughReason::WrongTokenKind));
        };

        // Authority comes from the store, not from the token's embedded roles.
        let Some(identity) = self.resolver.store().find_by_username(username).await? else {
            tracing::warn!(%subject, username, "bearer token for unknown account");
            return Ok(pass(PassThroughReason::UnknownSubject));
        };
        if identity.id != subject {
            tracing::warn!(%subject, username, owner = %identity.id, "username now belongs to another account");
            return Ok(pass(PassThroughReason::UnknownSubject));
        }
        if !identity.enabled {
            tracing::warn!(%subject, username, "bearer token for disabled account");
            return Ok(pass(PassThroughReason::Disabled));
        }

        let principal = self.resolver.principal_for(&identity).await?;
        tracing::debug!(%subject, username, "request authenticated");
        Ok(AuthOutcome::Bound(principal))
    }
}

fn pass(reason: PassThroughReason) -> AuthOutcome {
    AuthOutcome::PassThrough(reason)
}
