//! Expansion of a subject's role assignments into effective authority.

use std::collections::BTreeSet;
use std::sync::Arc;

use tollgate_core::{StoreResult, SubjectId};

use crate::{CredentialStore, Identity, PermissionCode, Principal, Role, RoleCode};

/// Resolves roles and the union of their permissions from the credential
/// store. Holds no state of its own; every call reads the store.
#[derive(Clone)]
pub struct AuthorizationResolver {
    store: Arc<dyn CredentialStore>,
}

impl AuthorizationResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Role definitions assigned to the subject, deduplicated by id. Ids with
    /// no definition are skipped.
    async fn assigned_roles(&self, subject: SubjectId) -> StoreResult<Vec<Role>> {
        let mut ids = self.store.role_assignments(subject).await?;
        ids.sort();
        ids.dedup();

        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.role(id).await? {
                Some(role) => roles.push(role),
                None => tracing::debug!(%subject, role_id = %id, "skipping unknown role assignment"),
            }
        }
        Ok(roles)
    }

    pub async fn roles_of(&self, subject: SubjectId) -> StoreResult<BTreeSet<RoleCode>> {
        Ok(self
            .assigned_roles(subject)
            .await?
            .into_iter()
            .map(|r| r.code)
            .collect())
    }

    /// Union of the permissions granted by each assigned role.
    pub async fn permissions_of(&self, subject: SubjectId) -> StoreResult<BTreeSet<PermissionCode>> {
        let roles = self.assigned_roles(subject).await?;
        self.permissions_of_roles(&roles).await
    }

    async fn permissions_of_roles(&self, roles: &[Role]) -> StoreResult<BTreeSet<PermissionCode>> {
        let mut permissions = BTreeSet::new();
        for role in roles {
            permissions.extend(self.store.role_permissions(role.id).await?);
        }
        Ok(permissions)
    }

    /// Build the principal for an identity from current store state.
    pub async fn principal_for(&self, identity: &Identity) -> StoreResult<Principal> {
        let roles = self.assigned_roles(identity.id).await?;
        let permissions = self.permissions_of_roles(&roles).await?;
        Ok(Principal {
            subject_id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            roles: roles.into_iter().map(|r| r.code).collect(),
            permissions,
        })
    }
}

impl core::fmt::Debug for AuthorizationResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationResolver").finish_non_exhaustive()
    }
}
