//! In-crate fixture store for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tollgate_core::{RoleId, StoreError, StoreResult, SubjectId};

use crate::{CredentialStore, Identity, PermissionCode, Role};

/// Passwords are stored as `plain:<password>`.
#[derive(Debug, Default)]
pub struct FixtureStore {
    pub users: Vec<Identity>,
    pub roles: Vec<Role>,
    pub assignments: HashMap<SubjectId, Vec<RoleId>>,
    pub grants: HashMap<RoleId, Vec<PermissionCode>>,
    pub failing: AtomicBool,
}

impl FixtureStore {
    /// `admin` (ADMIN: user:view, user:edit; USER: user:view) plus a
    /// dangling role id, and a disabled `ghost`.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.users.push(identity(1, "admin", "secret", true));
        store.users.push(identity(2, "ghost", "secret", false));
        store.roles.push(Role::new(RoleId::new(1), "ADMIN", "Administrator"));
        store.roles.push(Role::new(RoleId::new(2), "USER", "User"));
        store.roles.push(Role::new(RoleId::new(3), "EMPTY", "No grants"));
        store.assignments.insert(
            SubjectId::new(1),
            vec![RoleId::new(1), RoleId::new(2), RoleId::new(2), RoleId::new(3), RoleId::new(99)],
        );
        store.assignments.insert(SubjectId::new(2), vec![RoleId::new(2)]);
        store.grants.insert(
            RoleId::new(1),
            vec![PermissionCode::new("user:view"), PermissionCode::new("user:edit")],
        );
        store.grants.insert(RoleId::new(2), vec![PermissionCode::new("user:view")]);
        store
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("fixture offline"));
        }
        Ok(())
    }
}

pub fn identity(id: i64, username: &str, password: &str, enabled: bool) -> Identity {
    Identity {
        id: SubjectId::new(id),
        username: username.to_string(),
        password_hash: format!("plain:{password}"),
        email: format!("{username}@example.com"),
        enabled,
    }
}

#[async_trait]
impl CredentialStore for FixtureStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        self.check()?;
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: SubjectId) -> StoreResult<Option<Identity>> {
        self.check()?;
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn role_assignments(&self, id: SubjectId) -> StoreResult<Vec<RoleId>> {
        self.check()?;
        Ok(self.assignments.get(&id).cloned().unwrap_or_default())
    }

    async fn role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        self.check()?;
        Ok(self.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<PermissionCode>> {
        self.check()?;
        Ok(self.grants.get(&id).cloned().unwrap_or_default())
    }

    fn verify_password(&self, raw: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(raw)
    }
}
