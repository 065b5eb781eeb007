//! Persisted records: credentials, entities, and the identifiers that key them.

pub mod credential;
pub mod entity;
pub mod id;

pub use credential::*;
pub use entity::*;
pub use id::*;
