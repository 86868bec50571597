//! Infrastructure adapters for the auth core: credential stores and
//! key-value backends.

pub mod credential_store;
pub mod kv;

pub use credential_store::in_memory::{InMemoryCredentialStore, SEED_PASSWORD};
#[cfg(feature = "redis")]
pub use kv::redis::RedisKeyValueStore;
