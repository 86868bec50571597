//! Shared key-value backends for revocation state.
//!
//! The in-process backend lives next to the trait in `tollgate-auth`.

#[cfg(feature = "redis")]
pub mod redis;
