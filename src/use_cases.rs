//! Application-facing operations composed from the orchestrator and the stores.
//!
//! Each use case is a small struct built from a [`ModuleContext`](crate::module::ModuleContext) and exposing one
//! `execute` method, so hosts can wire them into whatever request layer they run.

pub mod authorization;
pub mod lookup;

pub use authorization::*;
pub use lookup::*;
