//! Thread-safe in-memory [`CredentialStore`] + [`EntityStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	record::{
		Credential, CredentialFilter, CredentialId, CredentialSelector, CredentialUpdate, Entity,
		EntityDraft, EntityId, EntityKey, UserId,
	},
	store::{CredentialStore, EntityStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<Tables>>;

#[derive(Debug, Default)]
struct Tables {
	credentials: BTreeMap<CredentialId, Credential>,
	entities: BTreeMap<EntityId, Entity>,
	entity_keys: HashMap<EntityKey, EntityId>,
}

/// Thread-safe storage backend that keeps records in-process.
///
/// Every mutating operation holds one write lock for its whole find-and-modify, so
/// concurrent upserts with identical identifying keys converge on one record.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of stored credentials.
	pub fn credential_count(&self) -> usize {
		self.0.read().credentials.len()
	}

	/// Returns the number of stored entities.
	pub fn entity_count(&self) -> usize {
		self.0.read().entities.len()
	}

	/// Inserts a credential verbatim, replacing any record with the same identifier.
	pub fn insert_credential(&self, credential: Credential) {
		self.0.write().credentials.insert(credential.id.clone(), credential);
	}

	fn upsert_now(
		map: StoreMap,
		selector: CredentialSelector,
		update: CredentialUpdate,
	) -> Result<Credential, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();
		let target = match selector {
			CredentialSelector::Id(id) => guard.credentials.contains_key(&id).then_some(id),
			CredentialSelector::Filter(filter) => {
				let mut matches = guard
					.credentials
					.values()
					.filter(|record| record.matches(&filter))
					.map(|record| record.id.clone());
				let first = matches.next();

				if matches.next().is_some() {
					return Err(StoreError::ambiguous_credential(&filter));
				}

				first
			},
		};

		match target.and_then(|id| guard.credentials.get_mut(&id)) {
			Some(record) => {
				update.apply(record, now);

				Ok(record.clone())
			},
			None => {
				let record = update.into_credential(CredentialId::generate(), now);

				guard.credentials.insert(record.id.clone(), record.clone());

				Ok(record)
			},
		}
	}

	fn find_or_create_now(map: StoreMap, draft: EntityDraft) -> Result<Entity, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();
		let Tables { entities, entity_keys, .. } = &mut *guard;

		if let Some(id) = entity_keys.get(&draft.key)
			&& let Some(entity) = entities.get_mut(id)
		{
			entity.merge(draft, now);

			return Ok(entity.clone());
		}

		let entity = draft.into_entity(EntityId::generate(), now);

		entity_keys.insert(entity.key(), entity.id.clone());
		entities.insert(entity.id.clone(), entity.clone());

		Ok(entity)
	}
}
impl CredentialStore for MemoryStore {
	fn get_credential<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<Credential>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().credentials.get(id).cloned()) })
	}

	fn find_credentials<'a>(
		&'a self,
		filter: &'a CredentialFilter,
	) -> StoreFuture<'a, Vec<Credential>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map
				.read()
				.credentials
				.values()
				.filter(|record| record.matches(filter))
				.cloned()
				.collect::<Vec<_>>())
		})
	}

	fn upsert_credential(
		&self,
		selector: CredentialSelector,
		update: CredentialUpdate,
	) -> StoreFuture<'_, Credential> {
		let map = self.0.clone();

		Box::pin(async move { Self::upsert_now(map, selector, update) })
	}

	fn set_credential_validity<'a>(
		&'a self,
		id: &'a CredentialId,
		valid: bool,
	) -> StoreFuture<'a, Option<Credential>> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			Ok(guard.credentials.get_mut(id).map(|record| {
				record.auth_is_valid = valid;
				record.updated_at = OffsetDateTime::now_utc();

				record.clone()
			}))
		})
	}

	fn delete_credential<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().credentials.remove(id).is_some()) })
	}
}
impl EntityStore for MemoryStore {
	fn get_entity<'a>(&'a self, id: &'a EntityId) -> StoreFuture<'a, Option<Entity>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().entities.get(id).cloned()) })
	}

	fn find_entities<'a>(
		&'a self,
		user_id: &'a UserId,
		module_name: Option<&'a str>,
	) -> StoreFuture<'a, Vec<Entity>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map
				.read()
				.entities
				.values()
				.filter(|entity| &entity.user_id == user_id)
				.filter(|entity| module_name.is_none_or(|name| entity.module_name == name))
				.cloned()
				.collect::<Vec<_>>())
		})
	}

	fn find_or_create_entity(&self, draft: EntityDraft) -> StoreFuture<'_, Entity> {
		let map = self.0.clone();

		Box::pin(async move { Self::find_or_create_now(map, draft) })
	}

	fn set_entity_credential<'a>(
		&'a self,
		id: &'a EntityId,
		credential_id: Option<CredentialId>,
	) -> StoreFuture<'a, Option<Entity>> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			Ok(guard.entities.get_mut(id).map(|entity| {
				entity.credential_id = credential_id;
				entity.updated_at = OffsetDateTime::now_utc();

				entity.clone()
			}))
		})
	}
}
