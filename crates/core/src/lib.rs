//! `tollgate-core` — identifiers and failure types shared by every crate.
//!
//! This crate contains no crypto, storage or IO.

pub mod error;
pub mod id;

pub use error::{StoreError, StoreResult};
pub use id::{RoleId, SubjectId};
