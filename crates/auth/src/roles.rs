use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use tollgate_core::RoleId;

/// Role code used for RBAC (e.g. `SUPER_ADMIN`).
///
/// Codes are stored bare; the `ROLE_` prefix only exists in the textual
/// authority vocabulary (see [`crate::Requirement`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCode(Cow<'static, str>);

impl RoleCode {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role definition as held by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub code: RoleCode,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    pub fn new(id: RoleId, code: impl Into<Cow<'static, str>>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: RoleCode::new(code),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
