//! Credential store seam.

use async_trait::async_trait;

use tollgate_core::{RoleId, StoreResult, SubjectId};

use crate::{Identity, PermissionCode, Role};

/// Lookup service for accounts, role assignments and role grants.
///
/// Implementations may hit the network; callers own timeouts. Faults are
/// returned as [`tollgate_core::StoreError`] and never retried here.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>>;

    async fn find_by_id(&self, id: SubjectId) -> StoreResult<Option<Identity>>;

    /// Role ids assigned to the subject. May reference roles that no longer
    /// exist.
    async fn role_assignments(&self, id: SubjectId) -> StoreResult<Vec<RoleId>>;

    async fn role(&self, id: RoleId) -> StoreResult<Option<Role>>;

    /// Permission codes granted to a role. Unknown roles grant nothing.
    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<PermissionCode>>;

    /// Compare a raw password with a stored hash.
    fn verify_password(&self, raw: &str, hash: &str) -> bool;
}
