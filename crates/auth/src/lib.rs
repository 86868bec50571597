//! `tollgate-auth` — token issuance, verification and request authentication.
//!
//! This crate is decoupled from HTTP and from any concrete storage: accounts
//! come through [`CredentialStore`], revocation state through
//! [`KeyValueStore`].

pub mod authenticator;
pub mod authorize;
pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod revocation;
pub mod roles;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use authenticator::{AuthOutcome, PassThroughReason, RequestAuthenticator, extract_bearer};
pub use authorize::{authorize, authorize_outcome};
pub use claims::{Claims, TokenError, TokenKind, validate_claims};
pub use codec::TokenCodec;
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, AuthResult};
pub use permissions::PermissionCode;
pub use principal::{Identity, Principal, Requirement};
pub use resolver::AuthorizationResolver;
pub use revocation::{InMemoryKeyValueStore, KeyValueStore, RevocationRegistry};
pub use roles::{Role, RoleCode};
pub use session::{AuthSessionService, LoginRequest, LoginResponse, TOKEN_TYPE_BEARER, UserInfo};
pub use store::CredentialStore;
