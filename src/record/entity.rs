//! Per-user records for connected external accounts.

// self
use crate::{
	_prelude::*,
	record::{CredentialId, EntityId, UserId},
};

/// Vendor-supplied identity of the external account behind an authorization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDetails {
	/// Stable account identifier on the vendor side.
	pub external_id: String,
	/// Display name, when the vendor exposes one.
	pub name: Option<String>,
	/// Extra fields stored alongside the entity.
	#[serde(default)]
	pub details: Map<String, Value>,
}
impl EntityDetails {
	/// Creates details for the provided external identifier.
	pub fn new(external_id: impl Into<String>) -> Self {
		Self { external_id: external_id.into(), name: None, details: Map::new() }
	}

	/// Sets the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());

		self
	}

	/// Adds a detail field.
	pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.details.insert(key.into(), value.into());

		self
	}
}

/// Identity triple under which at most one entity exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
	/// Owning user.
	pub user_id: UserId,
	/// Vendor module name.
	pub module_name: String,
	/// Vendor-side account identifier.
	pub external_id: String,
}
impl Display for EntityKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}/{}", self.user_id, self.module_name, self.external_id)
	}
}

/// Input for an entity find-or-create.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDraft {
	/// Identity triple.
	pub key: EntityKey,
	/// Display name recorded on creation or refreshed on match.
	pub name: Option<String>,
	/// Fields merged into the record.
	pub fields: Map<String, Value>,
	/// Credential the entity must reference afterwards.
	pub credential_id: Option<CredentialId>,
}
impl EntityDraft {
	/// Builds a draft from vendor details.
	pub fn new(
		user_id: UserId,
		module_name: impl Into<String>,
		details: EntityDetails,
		credential_id: Option<CredentialId>,
	) -> Self {
		Self {
			key: EntityKey {
				user_id,
				module_name: module_name.into(),
				external_id: details.external_id,
			},
			name: details.name,
			fields: details.details,
			credential_id,
		}
	}

	/// Materializes a new record from the draft.
	pub fn into_entity(self, id: EntityId, now: OffsetDateTime) -> Entity {
		Entity {
			id,
			user_id: self.key.user_id,
			module_name: self.key.module_name,
			external_id: self.key.external_id,
			name: self.name,
			credential_id: self.credential_id,
			fields: self.fields,
			created_at: now,
			updated_at: now,
		}
	}
}

/// One connected external account of one vendor type, owned by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
	/// Record identifier.
	pub id: EntityId,
	/// Owning user.
	pub user_id: UserId,
	/// Vendor module name.
	pub module_name: String,
	/// Vendor-side account identifier.
	pub external_id: String,
	/// Display name.
	pub name: Option<String>,
	/// The single credential currently backing the entity.
	pub credential_id: Option<CredentialId>,
	/// Extra vendor fields.
	pub fields: Map<String, Value>,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Last modification instant.
	pub updated_at: OffsetDateTime,
}
impl Entity {
	/// Returns the identity triple of the record.
	pub fn key(&self) -> EntityKey {
		EntityKey {
			user_id: self.user_id.clone(),
			module_name: self.module_name.clone(),
			external_id: self.external_id.clone(),
		}
	}

	/// Reconciles an existing record with a repeated draft, returning `true` when anything changed.
	pub fn merge(&mut self, draft: EntityDraft, now: OffsetDateTime) -> bool {
		let mut changed = false;

		if self.credential_id != draft.credential_id && draft.credential_id.is_some() {
			self.credential_id = draft.credential_id;
			changed = true;
		}
		if draft.name.is_some() && self.name != draft.name {
			self.name = draft.name;
			changed = true;
		}

		for (key, value) in draft.fields {
			if self.fields.get(&key) != Some(&value) {
				self.fields.insert(key, value);
				changed = true;
			}
		}

		if changed {
			self.updated_at = now;
		}

		changed
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn merge_replaces_credential_and_keeps_identity() {
		let user = UserId::new("u1").expect("User fixture should be valid.");
		let first = CredentialId::generate();
		let second = CredentialId::generate();
		let now = OffsetDateTime::now_utc();
		let mut entity = EntityDraft::new(
			user.clone(),
			"demo",
			EntityDetails::new("acct-1").with_name("Acme"),
			Some(first),
		)
		.into_entity(EntityId::generate(), now);
		let id = entity.id.clone();
		let changed = entity.merge(
			EntityDraft::new(user, "demo", EntityDetails::new("acct-1"), Some(second.clone())),
			now,
		);

		assert!(changed);
		assert_eq!(entity.id, id);
		assert_eq!(entity.credential_id, Some(second));
		assert_eq!(entity.name.as_deref(), Some("Acme"));
	}

	#[test]
	fn identical_draft_is_not_a_change() {
		let user = UserId::new("u1").expect("User fixture should be valid.");
		let draft = EntityDraft::new(user, "demo", EntityDetails::new("acct-1"), None);
		let mut entity = draft.clone().into_entity(EntityId::generate(), OffsetDateTime::now_utc());

		assert!(!entity.merge(draft, OffsetDateTime::now_utc()));
		assert_eq!(entity.key().to_string(), "u1/demo/acct-1");
	}
}
