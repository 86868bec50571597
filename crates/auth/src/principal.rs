use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tollgate_core::SubjectId;

use crate::{PermissionCode, RoleCode};

/// Account record as loaded from the credential store.
///
/// Loaded fresh for every decision and never mutated by this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: SubjectId,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub enabled: bool,
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("email", &self.email)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A fully resolved principal: identity plus its effective authority.
///
/// Roles and permissions are kept as two typed sets; checks go through
/// [`Principal::has_any`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: SubjectId,
    pub username: String,
    pub email: String,
    pub roles: BTreeSet<RoleCode>,
    pub permissions: BTreeSet<PermissionCode>,
}

impl Principal {
    pub fn has_role(&self, role: &RoleCode) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &PermissionCode) -> bool {
        self.permissions.contains(permission)
    }

    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        match requirement {
            Requirement::Role(role) => self.has_role(role),
            Requirement::Permission(permission) => self.has_permission(permission),
        }
    }

    /// True when at least one requirement is met. An empty slice is never met.
    pub fn has_any(&self, requirements: &[Requirement]) -> bool {
        requirements.iter().any(|r| self.satisfies(r))
    }
}

/// One authority a route may demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    Role(RoleCode),
    Permission(PermissionCode),
}

impl Requirement {
    pub const ROLE_PREFIX: &'static str = "ROLE_";

    pub fn role(code: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        Self::Role(RoleCode::new(code))
    }

    pub fn permission(code: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        Self::Permission(PermissionCode::new(code))
    }

    /// Parse the textual authority form: `ROLE_<code>` is a role, anything
    /// else is a permission code.
    pub fn parse(authority: &str) -> Self {
        match authority.strip_prefix(Self::ROLE_PREFIX) {
            Some(code) => Self::role(code.to_string()),
            None => Self::permission(authority.to_string()),
        }
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "{}{}", Self::ROLE_PREFIX, role),
            Requirement::Permission(permission) => write!(f, "{permission}"),
        }
    }
}
