//! Login, logout and refresh orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::SubjectId;

use crate::{
    AuthError, AuthOutcome, AuthResult, AuthorizationResolver, Principal,
    RevocationRegistry, TokenCodec,
};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Login request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: SubjectId,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<&Principal> for UserInfo {
    fn from(principal: &Principal) -> Self {
        Self {
            user_id: principal.subject_id,
            username: principal.username.clone(),
            email: principal.email.clone(),
            roles: principal.roles.iter().map(|r| r.to_string()).collect(),
            permissions: principal.permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Token pair handed out by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
    pub user_info: UserInfo,
}

/// Orchestrates the session lifecycle over codec, registry and resolver.
#[derive(Debug, Clone)]
pub struct AuthSessionService {
    codec: TokenCodec,
    registry: RevocationRegistry,
    resolver: AuthorizationResolver,
}

impl AuthSessionService {
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

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    /// Check credentials and issue a fresh token pair.
    ///
    /// The new refresh token replaces (and revokes) any earlier binding.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginResponse> {
        if username.trim().is_empty() {
            return Err(AuthError::invalid_argument("username must not be blank"));
        }
        if password.trim().is_empty() {
            return Err(AuthError::invalid_argument("password must not be blank"));
        }

        let store = self.resolver.store();
        let identity = match store.find_by_username(username).await? {
            Some(identity) if store.verify_password(password, &identity.password_hash) => identity,
            _ => {
                tracing::warn!(username, "login rejected: bad credentials");
                return Err(AuthError::authentication_failed("bad credentials"));
            }
        };
        if !identity.enabled {
            tracing::warn!(username, "login rejected: account disabled");
            return Err(AuthError::authentication_failed("account disabled"));
        }

        let principal = self.resolver.principal_for(&identity).await?;
        let (response, refresh_expires_at) = self.issue_pair(&principal)?;
        self.registry
            .store_refresh(principal.subject_id, &response.refresh_token, refresh_expires_at)?;

        tracing::info!(subject = %principal.subject_id, username, "login succeeded");
        Ok(response)
    }

    /// Revoke the presented token and the subject's refresh binding.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        if token.trim().is_empty() {
            return Err(AuthError::invalid_argument("token must not be blank"));
        }
        let token = token.trim();
        let claims = self.codec.validate(token)?;
        if self.registry.is_revoked(token)? {
            return Err(AuthError::token_invalid("token already revoked"));
        }

        let subject = claims.subject();
        self.registry.revoke_until(token, claims.expires_at())?;
        self.registry.retire_refresh(subject)?;

        tracing::info!(%subject, kind = %claims.kind(), "logout succeeded");
        Ok(())
    }

    /// Exchange a live refresh token for a new pair with current authority.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<LoginResponse> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::token_invalid("refresh token must not be blank"));
        }

        let claims = self.codec.validate(refresh_token)?;
        if !claims.is_refresh() {
            return Err(AuthError::token_invalid("not a refresh token"));
        }
        if self.registry.is_revoked(refresh_token)? {
            return Err(AuthError::token_invalid("refresh token revoked"));
        }

        let subject = claims.subject();
        let Some(identity) = self.resolver.store().find_by_id(subject).await? else {
            return Err(AuthError::token_invalid("subject no longer exists"));
        };
        if !identity.enabled {
            return Err(AuthError::authentication_failed("account disabled"));
        }

        let principal = self.resolver.principal_for(&identity).await?;
        let (response, refresh_expires_at) = self.issue_pair(&principal)?;
        let rotated = self.registry.rotate_refresh(
            subject,
            refresh_token,
            claims.expires_at(),
            &response.refresh_token,
            refresh_expires_at,
        )?;
        if !rotated {
            tracing::warn!(%subject, "refresh rejected: token superseded");
            return Err(AuthError::token_invalid("refresh token superseded"));
        }

        tracing::info!(%subject, "refresh succeeded");
        Ok(response)
    }

    /// The caller bound by the request authenticator.
    pub fn current_user(&self, outcome: &AuthOutcome) -> AuthResult<UserInfo> {
        outcome
            .principal()
            .map(UserInfo::from)
            .ok_or(AuthError::Unauthenticated)
    }

    /// Issue access and refresh tokens; also returns the refresh token's
    /// `exp`.
    fn issue_pair(&self, principal: &Principal) -> AuthResult<(LoginResponse, DateTime<Utc>)> {
        let roles: Vec<_> = principal.roles.iter().cloned().collect();
        let access = self
            .codec
            .issue_access(principal.subject_id, &principal.username, &roles)?;
        let (refresh, refresh_expires_at) =
            self.codec.issue_refresh_with_expiry(principal.subject_id)?;

        let response = LoginResponse {
            access_token: access,
            refresh_token: refresh,
            expires_in: self.codec.access_ttl().num_seconds(),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            user_info: UserInfo::from(principal),
        };
        Ok((response, refresh_expires_at))
    }
}
