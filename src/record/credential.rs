//! Credential records and the identifying contract used to upsert them.

// self
use crate::{
	_prelude::*,
	record::{CredentialId, UserId},
};

/// Vendor-supplied description of a credential or entity: `identifiers` form the upsert
/// filter, `details` form the merged document body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDetails {
	/// Keys that uniquely identify the external account.
	pub identifiers: BTreeMap<String, String>,
	/// Arbitrary fields merged into the persisted document.
	pub details: Map<String, Value>,
}
impl RecordDetails {
	/// Creates an empty description.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an identifying key.
	pub fn identifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.identifiers.insert(key.into(), value.into());

		self
	}

	/// Adds a detail field.
	pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.details.insert(key.into(), value.into());

		self
	}
}

/// Persisted secret material for one external account plus its validity flag.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Record identifier.
	pub id: CredentialId,
	/// Owning user, when known.
	pub user_id: Option<UserId>,
	/// `false` once the live API rejected the credential; cleared by re-authorization.
	pub auth_is_valid: bool,
	/// Identifier and detail fields (including secret auth material).
	pub fields: Map<String, Value>,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Last modification instant.
	pub updated_at: OffsetDateTime,
}
impl Credential {
	/// Returns a string field, if present.
	pub fn field_str(&self, key: &str) -> Option<&str> {
		self.fields.get(key).and_then(Value::as_str)
	}

	/// Returns `true` when the record satisfies every constraint in `filter`.
	pub fn matches(&self, filter: &CredentialFilter) -> bool {
		if let Some(user) = &filter.user_id
			&& self.user_id.as_ref() != Some(user)
		{
			return false;
		}

		filter.fields.iter().all(|(key, value)| self.fields.get(key) == Some(value))
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("id", &self.id)
			.field("user_id", &self.user_id)
			.field("auth_is_valid", &self.auth_is_valid)
			.field("fields", &self.fields.keys().collect::<Vec<_>>())
			.field("created_at", &self.created_at)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Search constraints for credential lookups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialFilter {
	/// Owning user constraint.
	pub user_id: Option<UserId>,
	/// Exact-match field constraints.
	pub fields: Map<String, Value>,
}
impl CredentialFilter {
	/// Builds a filter from vendor identifiers scoped to `user_id`.
	pub fn from_identifiers(user_id: Option<UserId>, identifiers: &BTreeMap<String, String>) -> Self {
		let fields = identifiers
			.iter()
			.map(|(key, value)| (key.clone(), Value::String(value.clone())))
			.collect();

		Self { user_id, fields }
	}

	/// Returns `true` when the filter carries no constraint at all.
	pub fn is_unconstrained(&self) -> bool {
		self.user_id.is_none() && self.fields.is_empty()
	}
}
impl Display for CredentialFilter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let user = self.user_id.as_ref().map(|id| id.as_ref()).unwrap_or("*");
		let keys = self.fields.keys().map(String::as_str).collect::<Vec<_>>().join(",");

		write!(f, "user={user} fields=[{keys}]")
	}
}

/// How an upsert locates the credential it modifies.
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialSelector {
	/// Modify the record with this identifier, creating it when it no longer exists.
	Id(CredentialId),
	/// Modify the single record matching the filter, creating one when none match.
	Filter(CredentialFilter),
}

/// Field changes applied by a credential upsert.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CredentialUpdate {
	/// Owning user to record (kept when `None`).
	pub user_id: Option<UserId>,
	/// Fields merged over the existing document.
	pub fields: Map<String, Value>,
	/// New validity flag (kept when `None`; new records default to valid).
	pub auth_is_valid: Option<bool>,
}
impl CredentialUpdate {
	/// Merges identifiers and details into one update, identifiers first.
	pub fn from_details(user_id: Option<UserId>, details: RecordDetails) -> Self {
		let mut fields: Map<String, Value> = details
			.identifiers
			.into_iter()
			.map(|(key, value)| (key, Value::String(value)))
			.collect();

		fields.extend(details.details);

		Self { user_id, fields, auth_is_valid: None }
	}

	/// Sets the validity flag carried by the update.
	pub fn with_auth_is_valid(mut self, valid: bool) -> Self {
		self.auth_is_valid = Some(valid);

		self
	}

	/// Applies the update to an existing record.
	pub fn apply(self, record: &mut Credential, now: OffsetDateTime) {
		if let Some(user) = self.user_id {
			record.user_id = Some(user);
		}
		if let Some(valid) = self.auth_is_valid {
			record.auth_is_valid = valid;
		}

		record.fields.extend(self.fields);
		record.updated_at = now;
	}

	/// Materializes a new record from the update.
	pub fn into_credential(self, id: CredentialId, now: OffsetDateTime) -> Credential {
		Credential {
			id,
			user_id: self.user_id,
			auth_is_valid: self.auth_is_valid.unwrap_or(true),
			fields: self.fields,
			created_at: now,
			updated_at: now,
		}
	}
}
