//! Token blacklist and refresh-token bindings.
//!
//! State lives behind [`KeyValueStore`] so a shared cache can back it when
//! more than one process verifies tokens.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use tollgate_core::{StoreError, StoreResult, SubjectId};

/// Key-value storage seam with optional per-key expiry.
///
/// Every operation is atomic per key.
pub trait KeyValueStore: Send + Sync {
    /// Set `key`, returning the value it replaced.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Option<String>>;

    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`, returning the value it held.
    fn delete(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value of `key` with `new` only if it currently equals
    /// `expected`. Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local store for single-instance deployments and tests.
///
/// Expired entries read as absent; [`InMemoryKeyValueStore::purge_expired`]
/// reclaims their memory.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }

    pub fn len(&self) -> StoreResult<usize> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        Ok(entries.values().filter(|e| e.is_live(now)).count())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Option<String>> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        let previous = entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(previous.filter(|e| e.is_live(now)).map(|e| e.value))
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    fn delete(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        Ok(entries
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        let matches = entries
            .get(key)
            .is_some_and(|e| e.is_live(now) && e.value == expected);
        if matches {
            entries.insert(key.to_string(), Entry::new(new, ttl));
        }
        Ok(matches)
    }
}

const BLACKLIST_PREFIX: &str = "tollgate:blacklist:";
const REFRESH_PREFIX: &str = "tollgate:refresh:";
const REVOKED_MARKER: &str = "1";

/// Blacklist of tokens invalidated before expiry, plus the single active
/// refresh token of each subject.
///
/// Replacing a subject's refresh binding revokes the token it replaces, so at
/// most one refresh token per subject is usable at any time. Bindings record
/// their token's expiry, so every blacklist entry the registry writes on its
/// own lapses when the token would have.
#[derive(Clone)]
pub struct RevocationRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryKeyValueStore::arc())
    }

    /// Blacklist `token` with no expiry. Idempotent.
    pub fn revoke(&self, token: &str) -> StoreResult<()> {
        self.store.put(&blacklist_key(token), REVOKED_MARKER, None)?;
        Ok(())
    }

    /// Blacklist `token` until its natural expiry, after which the store may
    /// forget it. Idempotent.
    pub fn revoke_until(&self, token: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let Some(ttl) = ttl_until(expires_at) else {
            // Already expired; signature checks reject it on their own.
            return Ok(());
        };
        self.store
            .put(&blacklist_key(token), REVOKED_MARKER, Some(ttl))?;
        Ok(())
    }

    pub fn is_revoked(&self, token: &str) -> StoreResult<bool> {
        Ok(self.store.get(&blacklist_key(token))?.is_some())
    }

    /// Bind `token` (expiring at `expires_at`) as the subject's refresh
    /// token, revoking the previous one until its own expiry.
    pub fn store_refresh(
        &self,
        subject: SubjectId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Option<String>> {
        let replaced = self.store.put(
            &refresh_key(subject),
            &Binding::encode(token, expires_at),
            ttl_until(expires_at),
        )?;
        let Some(previous) = replaced.as_deref().map(Binding::decode).transpose()? else {
            return Ok(None);
        };
        if previous.token != token {
            tracing::debug!(%subject, "superseded refresh token revoked");
            self.revoke_until(previous.token, previous.expires_at)?;
        }
        Ok(Some(previous.token.to_string()))
    }

    pub fn current_refresh(&self, subject: SubjectId) -> StoreResult<Option<String>> {
        self.store
            .get(&refresh_key(subject))?
            .as_deref()
            .map(|value| Binding::decode(value).map(|b| b.token.to_string()))
            .transpose()
    }

    /// Remove the subject's refresh binding, returning the token it held.
    pub fn clear_refresh(&self, subject: SubjectId) -> StoreResult<Option<String>> {
        Ok(self.take_refresh(subject)?.map(|(token, _)| token))
    }

    /// Remove the subject's refresh binding and revoke the token it held
    /// until that token's expiry.
    pub fn retire_refresh(&self, subject: SubjectId) -> StoreResult<Option<String>> {
        let Some((token, expires_at)) = self.take_refresh(subject)? else {
            return Ok(None);
        };
        self.revoke_until(&token, expires_at)?;
        Ok(Some(token))
    }

    /// Atomically replace `presented` with `replacement` as the subject's
    /// refresh binding. Fails (returns `false`) if `presented` is no longer
    /// the current binding, e.g. after a logout or a concurrent refresh.
    ///
    /// `presented_expires_at` must be the presented token's `exp`; it both
    /// identifies the binding and bounds the revocation of `presented`.
    pub fn rotate_refresh(
        &self,
        subject: SubjectId,
        presented: &str,
        presented_expires_at: DateTime<Utc>,
        replacement: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let swapped = self.store.compare_and_swap(
            &refresh_key(subject),
            &Binding::encode(presented, presented_expires_at),
            &Binding::encode(replacement, expires_at),
            ttl_until(expires_at),
        )?;
        if swapped {
            self.revoke_until(presented, presented_expires_at)?;
        }
        Ok(swapped)
    }

    fn take_refresh(&self, subject: SubjectId) -> StoreResult<Option<(String, DateTime<Utc>)>> {
        let Some(value) = self.store.delete(&refresh_key(subject))? else {
            return Ok(None);
        };
        let binding = Binding::decode(&value)?;
        Ok(Some((binding.token.to_string(), binding.expires_at)))
    }
}

impl core::fmt::Debug for RevocationRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RevocationRegistry").finish_non_exhaustive()
    }
}

/// Stored form of a refresh binding: `<exp seconds>:<token>`.
struct Binding<'a> {
    token: &'a str,
    expires_at: DateTime<Utc>,
}

impl<'a> Binding<'a> {
    fn encode(token: &str, expires_at: DateTime<Utc>) -> String {
        format!("{}:{token}", expires_at.timestamp())
    }

    fn decode(value: &'a str) -> StoreResult<Self> {
        let corrupt = || StoreError::corrupt("refresh binding without a readable expiry");
        let (secs, token) = value.split_once(':').ok_or_else(corrupt)?;
        let expires_at = secs
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(corrupt)?;
        Ok(Self { token, expires_at })
    }
}

fn blacklist_key(token: &str) -> String {
    format!("{BLACKLIST_PREFIX}{token}")
}

fn refresh_key(subject: SubjectId) -> String {
    format!("{REFRESH_PREFIX}{subject}")
}

fn ttl_until(expires_at: DateTime<Utc>) -> Option<Duration> {
    (expires_at - Utc::now())
        .to_std()
        .ok()
        .filter(|ttl| !ttl.is_zero())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::Duration as ChronoDuration;

    use super::*;

    fn later() -> DateTime<Utc> {
        Utc::now() + ChronoDuration::minutes(10)
    }

    #[test]
    fn revoke_is_idempotent() {
        let registry = RevocationRegistry::in_memory();
        assert!(!registry.is_revoked("t1").unwrap());
        registry.revoke("t1").unwrap();
        registry.revoke("t1").unwrap();
        assert!(registry.is_revoked("t1").unwrap());
        assert!(!registry.is_revoked("t2").unwrap());
    }

    #[test]
    fn revoke_until_a_past_instant_stores_nothing() {
        let store = InMemoryKeyValueStore::arc();
        let registry = RevocationRegistry::new(store.clone());
        registry
            .revoke_until("old", Utc::now() - ChronoDuration::seconds(1))
            .unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn storing_a_refresh_binding_revokes_the_previous_one() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(1);
        let exp = later();

        assert_eq!(registry.store_refresh(subject, "r1", exp).unwrap(), None);
        assert_eq!(
            registry.store_refresh(subject, "r2", exp).unwrap().as_deref(),
            Some("r1")
        );
        assert_eq!(registry.current_refresh(subject).unwrap().as_deref(), Some("r2"));
        assert!(registry.is_revoked("r1").unwrap());
        assert!(!registry.is_revoked("r2").unwrap());
    }

    #[test]
    fn clear_refresh_returns_the_binding() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(1);
        registry.store_refresh(subject, "r1", later()).unwrap();

        assert_eq!(registry.clear_refresh(subject).unwrap().as_deref(), Some("r1"));
        assert_eq!(registry.clear_refresh(subject).unwrap(), None);
        assert_eq!(registry.current_refresh(subject).unwrap(), None);
        assert!(!registry.is_revoked("r1").unwrap());
    }

    #[test]
    fn retire_refresh_revokes_the_bound_token() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(1);
        registry.store_refresh(subject, "r1", later()).unwrap();

        assert_eq!(registry.retire_refresh(subject).unwrap().as_deref(), Some("r1"));
        assert!(registry.is_revoked("r1").unwrap());
        assert_eq!(registry.current_refresh(subject).unwrap(), None);
        assert_eq!(registry.retire_refresh(subject).unwrap(), None);
    }

    #[test]
    fn rotate_requires_the_current_binding() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(1);
        let exp = later();
        registry.store_refresh(subject, "r1", exp).unwrap();

        assert!(!registry.rotate_refresh(subject, "stale", exp, "r2", exp).unwrap());
        assert!(registry.rotate_refresh(subject, "r1", exp, "r2", exp).unwrap());
        assert!(registry.is_revoked("r1").unwrap());
        assert!(!registry.rotate_refresh(subject, "r1", exp, "r3", exp).unwrap());
        assert_eq!(registry.current_refresh(subject).unwrap().as_deref(), Some("r2"));
    }

    #[test]
    fn rotate_matches_the_recorded_expiry_too() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(1);
        let exp = later();
        registry.store_refresh(subject, "r1", exp).unwrap();

        let wrong = exp + ChronoDuration::seconds(5);
        assert!(!registry.rotate_refresh(subject, "r1", wrong, "r2", exp).unwrap());
        assert_eq!(registry.current_refresh(subject).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn retired_refresh_tokens_leave_the_blacklist_once_expired() {
        let store = InMemoryKeyValueStore::arc();
        let registry = RevocationRegistry::new(store.clone());
        let subject = SubjectId::new(1);
        let soon = Utc::now() + ChronoDuration::seconds(2);

        for i in 0..4 {
            registry.store_refresh(subject, &format!("login-{i}"), soon).unwrap();
        }
        assert!(registry.rotate_refresh(subject, "login-3", soon, "rotated", soon).unwrap());
        registry.retire_refresh(subject).unwrap();
        assert!(registry.is_revoked("login-0").unwrap());
        assert!(registry.is_revoked("rotated").unwrap());

        thread::sleep(Duration::from_millis(3_100));
        store.purge_expired().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn unreadable_binding_is_a_corrupt_store() {
        let store = InMemoryKeyValueStore::arc();
        let registry = RevocationRegistry::new(store.clone());
        store.put(&refresh_key(SubjectId::new(1)), "no-expiry", None).unwrap();

        assert!(matches!(
            registry.current_refresh(SubjectId::new(1)),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn concurrent_rotations_of_one_binding_have_a_single_winner() {
        let registry = RevocationRegistry::in_memory();
        let subject = SubjectId::new(9);
        let exp = later();
        registry.store_refresh(subject, "seed", exp).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry
                        .rotate_refresh(subject, "seed", exp, &format!("next-{i}"), exp)
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn expired_entries_read_as_absent_and_are_purged() {
        let store = InMemoryKeyValueStore::new();
        store.put("short", "v", Some(Duration::from_millis(5))).unwrap();
        store.put("long", "v", None).unwrap();
        thread::sleep(Duration::from_millis(20));

        assert_eq!(store.get("short").unwrap(), None);
        assert!(!store.compare_and_swap("short", "v", "w", None).unwrap());
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }
}
