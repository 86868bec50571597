//! In-memory credential store with BCrypt password hashes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use tollgate_auth::{CredentialStore, Identity, PermissionCode, Role};
use tollgate_core::{RoleId, StoreError, StoreResult, SubjectId};

/// Password of every seeded account.
pub const SEED_PASSWORD: &str = "123456";

/// Seed hashes use a low work factor so tests and demos start quickly.
const SEED_HASH_COST: u32 = 6;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<SubjectId, Identity>,
    usernames: HashMap<String, SubjectId>,
    roles: BTreeMap<RoleId, Role>,
    assignments: HashMap<SubjectId, Vec<RoleId>>,
    grants: HashMap<RoleId, Vec<PermissionCode>>,
}

/// Accounts, roles and grants held in process memory.
///
/// The admin methods (`upsert_user`, `set_enabled`, `assign_role`, ...) play
/// the external administrative collaborator; the auth core only reads.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo data set:
    ///
    /// | user | id | roles | status |
    /// |---|---|---|---|
    /// | admin | 1 | SUPER_ADMIN | enabled |
    /// | user | 2 | USER | enabled |
    /// | test | 3 | TESTER | disabled |
    ///
    /// SUPER_ADMIN holds all five `user:*` permissions, USER holds
    /// `user:view`, TESTER holds `user:view` and `user:create`. Every password
    /// is [`SEED_PASSWORD`].
    pub fn seeded() -> StoreResult<Self> {
        let store = Self::new();
        let hash = hash_password(SEED_PASSWORD, SEED_HASH_COST)?;

        for (id, username, enabled) in [(1, "admin", true), (2, "user", true), (3, "test", false)] {
            store.upsert_user(Identity {
                id: SubjectId::new(id),
                username: username.to_string(),
                password_hash: hash.clone(),
                email: format!("{username}@wheatmall.com"),
                enabled,
            })?;
        }

        store.define_role(
            Role::new(RoleId::new(1), "SUPER_ADMIN", "Super administrator")
                .with_description("Holds every permission"),
        )?;
        store.define_role(
            Role::new(RoleId::new(2), "USER", "User").with_description("Registered user"),
        )?;
        store.define_role(Role::new(RoleId::new(3), "TESTER", "Tester"))?;

        store.assign_role(SubjectId::new(1), RoleId::new(1))?;
        store.assign_role(SubjectId::new(2), RoleId::new(2))?;
        store.assign_role(SubjectId::new(3), RoleId::new(3))?;

        for code in ["user:view", "user:create", "user:update", "user:delete", "user:admin"] {
            store.grant(RoleId::new(1), PermissionCode::new(code))?;
        }
        store.grant(RoleId::new(2), PermissionCode::new("user:view"))?;
        store.grant(RoleId::new(3), PermissionCode::new("user:view"))?;
        store.grant(RoleId::new(3), PermissionCode::new("user:create"))?;

        Ok(store)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace an account. A renamed account releases its old
    /// username.
    pub fn upsert_user(&self, identity: Identity) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(old) = tables.users.get(&identity.id) {
            let old_name = old.username.clone();
            tables.usernames.remove(&old_name);
        }
        tables.usernames.insert(identity.username.clone(), identity.id);
        tables.users.insert(identity.id, identity);
        Ok(())
    }

    pub fn set_enabled(&self, id: SubjectId, enabled: bool) -> StoreResult<bool> {
        let mut tables = self.write()?;
        Ok(match tables.users.get_mut(&id) {
            Some(user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        })
    }

    pub fn remove_user(&self, id: SubjectId) -> StoreResult<Option<Identity>> {
        let mut tables = self.write()?;
        let removed = tables.users.remove(&id);
        if let Some(user) = &removed {
            tables.usernames.remove(&user.username);
        }
        tables.assignments.remove(&id);
        Ok(removed)
    }

    pub fn define_role(&self, role: Role) -> StoreResult<()> {
        self.write()?.roles.insert(role.id, role);
        Ok(())
    }

    pub fn remove_role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let mut tables = self.write()?;
        tables.grants.remove(&id);
        Ok(tables.roles.remove(&id))
    }

    pub fn assign_role(&self, subject: SubjectId, role: RoleId) -> StoreResult<()> {
        let mut tables = self.write()?;
        let assigned = tables.assignments.entry(subject).or_default();
        if !assigned.contains(&role) {
            assigned.push(role);
        }
        Ok(())
    }

    pub fn unassign_role(&self, subject: SubjectId, role: RoleId) -> StoreResult<()> {
        if let Some(assigned) = self.write()?.assignments.get_mut(&subject) {
            assigned.retain(|r| *r != role);
        }
        Ok(())
    }

    pub fn grant(&self, role: RoleId, permission: PermissionCode) -> StoreResult<()> {
        let mut tables = self.write()?;
        let granted = tables.grants.entry(role).or_default();
        if !granted.contains(&permission) {
            granted.push(permission);
        }
        Ok(())
    }

    pub fn users(&self) -> StoreResult<Vec<Identity>> {
        Ok(self.read()?.users.values().cloned().collect())
    }
}

/// BCrypt hash of `raw` at the given work factor.
pub fn hash_password(raw: &str, cost: u32) -> StoreResult<String> {
    bcrypt::hash(raw, cost).map_err(|e| StoreError::corrupt(format!("bcrypt: {e}")))
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        let tables = self.read()?;
        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: SubjectId) -> StoreResult<Option<Identity>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn role_assignments(&self, id: SubjectId) -> StoreResult<Vec<RoleId>> {
        Ok(self.read()?.assignments.get(&id).cloned().unwrap_or_default())
    }

    async fn role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<PermissionCode>> {
        Ok(self.read()?.grants.get(&id).cloned().unwrap_or_default())
    }

    fn verify_password(&self, raw: &str, hash: &str) -> bool {
        match bcrypt::verify(raw, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_accounts_are_reachable_by_name_and_id() {
        let store = InMemoryCredentialStore::seeded().unwrap();
        let admin = store.find_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.id, SubjectId::new(1));
        assert!(admin.enabled);
        assert_eq!(store.find_by_id(SubjectId::new(3)).await.unwrap().unwrap().username, "test");
        assert!(!store.find_by_id(SubjectId::new(3)).await.unwrap().unwrap().enabled);
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn passwords_are_bcrypt_hashed() {
        let store = InMemoryCredentialStore::seeded().unwrap();
        let admin = store.find_by_username("admin").await.unwrap().unwrap();
        assert!(admin.password_hash.starts_with("$2"));
        assert!(store.verify_password(SEED_PASSWORD, &admin.password_hash));
        assert!(!store.verify_password("654321", &admin.password_hash));
        assert!(!store.verify_password(SEED_PASSWORD, "not-a-hash"));
    }

    #[tokio::test]
    async fn renaming_releases_the_old_username() {
        let store = InMemoryCredentialStore::seeded().unwrap();
        let mut user = store.find_by_id(SubjectId::new(2)).await.unwrap().unwrap();
        user.username = "renamed".into();
        store.upsert_user(user).unwrap();

        assert!(store.find_by_username("user").await.unwrap().is_none());
        assert!(store.find_by_username("renamed").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn assignments_and_grants_do_not_duplicate() {
        let store = InMemoryCredentialStore::seeded().unwrap();
        store.assign_role(SubjectId::new(2), RoleId::new(2)).unwrap();
        store.grant(RoleId::new(2), PermissionCode::new("user:view")).unwrap();

        assert_eq!(store.role_assignments(SubjectId::new(2)).await.unwrap(), vec![RoleId::new(2)]);
        assert_eq!(store.role_permissions(RoleId::new(2)).await.unwrap().len(), 1);
        assert!(store.role_permissions(RoleId::new(42)).await.unwrap().is_empty());
    }
}
