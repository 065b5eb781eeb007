//! Storage contracts for credentials and entities, plus the built-in in-memory backend.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	record::{
		Credential, CredentialFilter, CredentialId, CredentialSelector, CredentialUpdate, Entity,
		EntityDraft, EntityId, UserId,
	},
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for credential records.
///
/// Field-level encryption, if any, lives behind the implementation; callers only see
/// plaintext [`Credential`] documents.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches a credential by identifier.
	fn get_credential<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<Credential>>;

	/// Returns every credential matching the filter.
	fn find_credentials<'a>(
		&'a self,
		filter: &'a CredentialFilter,
	) -> StoreFuture<'a, Vec<Credential>>;

	/// Atomically locates, merges, or creates a credential.
	///
	/// A [`CredentialSelector::Filter`] matching more than one record fails with
	/// [`StoreError::AmbiguousRecord`] and leaves every record untouched.
	fn upsert_credential(
		&self,
		selector: CredentialSelector,
		update: CredentialUpdate,
	) -> StoreFuture<'_, Credential>;

	/// Sets the validity flag, returning the updated record when it exists.
	fn set_credential_validity<'a>(
		&'a self,
		id: &'a CredentialId,
		valid: bool,
	) -> StoreFuture<'a, Option<Credential>>;

	/// Deletes a credential, returning `true` when a record was removed.
	fn delete_credential<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, bool>;
}

/// Persistence contract for entity records.
pub trait EntityStore
where
	Self: Send + Sync,
{
	/// Fetches an entity by identifier.
	fn get_entity<'a>(&'a self, id: &'a EntityId) -> StoreFuture<'a, Option<Entity>>;

	/// Lists the user's entities, optionally restricted to one module.
	fn find_entities<'a>(
		&'a self,
		user_id: &'a UserId,
		module_name: Option<&'a str>,
	) -> StoreFuture<'a, Vec<Entity>>;

	/// Atomically returns the entity for the draft's identity triple, creating it when absent.
	///
	/// A matched record adopts the draft's credential reference when it differs.
	fn find_or_create_entity(&self, draft: EntityDraft) -> StoreFuture<'_, Entity>;

	/// Replaces (or clears) the entity's credential reference.
	fn set_entity_credential<'a>(
		&'a self,
		id: &'a EntityId,
		credential_id: Option<CredentialId>,
	) -> StoreFuture<'a, Option<Entity>>;
}

/// Error type produced by [`CredentialStore`] and [`EntityStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A search expected to resolve one record matched several.
	#[error("More than one {kind} matches {filter}.")]
	AmbiguousRecord {
		/// Record kind (credential, entity).
		kind: &'static str,
		/// Rendered search constraints.
		filter: String,
	},
}
impl StoreError {
	/// Builds an ambiguous-credential error for the provided filter.
	pub fn ambiguous_credential(filter: &CredentialFilter) -> Self {
		Self::AmbiguousRecord { kind: "credential", filter: filter.to_string() }
	}
}
