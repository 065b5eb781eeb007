//! Read-only use cases.

// self
use crate::{
	_prelude::*,
	module::{ConnectionState, Module, ModuleContext},
	record::{Credential, CredentialId, Entity, EntityId, UserId},
};

/// Credential view safe to hand to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
	/// Credential identifier.
	pub id: CredentialId,
	/// Whether the live API still accepts it.
	pub auth_is_valid: bool,
}

/// Entity view returned by [`GetModule`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
	/// Entity identifier.
	pub id: EntityId,
	/// Vendor type name.
	#[serde(rename = "type")]
	pub module_name: String,
	/// Display name.
	pub name: Option<String>,
	/// Vendor-side account identifier.
	pub external_id: String,
	/// Owning user.
	pub user_id: UserId,
	/// Connection state.
	pub state: ConnectionState,
	/// Backing credential, when one exists.
	pub credential: Option<CredentialSummary>,
}

/// Describes one connected entity.
#[derive(Clone, Debug)]
pub struct GetModule {
	ctx: ModuleContext,
}
impl GetModule {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Summarizes the entity; entities of other users are not found.
	pub async fn execute(&self, entity_id: &EntityId, user_id: &UserId) -> Result<ModuleSummary> {
		let entity = owned_entity(&self.ctx, entity_id, user_id).await?;
		let credential = match &entity.credential_id {
			Some(id) => self.ctx.credentials.get_credential(id).await?,
			None => None,
		};
		let state = match &credential {
			None => ConnectionState::Unauthenticated,
			Some(credential) if credential.auth_is_valid => ConnectionState::Valid,
			Some(_) => ConnectionState::Invalid,
		};

		Ok(ModuleSummary {
			id: entity.id,
			module_name: entity.module_name,
			name: entity.name,
			external_id: entity.external_id,
			user_id: entity.user_id,
			state,
			credential: credential.map(|credential| CredentialSummary {
				id: credential.id,
				auth_is_valid: credential.auth_is_valid,
			}),
		})
	}
}

/// Produces an unauthenticated orchestrator for a vendor type.
#[derive(Clone, Debug)]
pub struct GetModuleInstanceFromType {
	ctx: ModuleContext,
}
impl GetModuleInstanceFromType {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Builds the orchestrator; unknown vendor types fail.
	pub fn execute(&self, user_id: &UserId, module_name: &str) -> Result<Module> {
		Module::for_type(self.ctx.clone(), module_name, user_id.clone())
	}
}

/// Lists a user's entities.
#[derive(Clone, Debug)]
pub struct GetEntitiesForUser {
	ctx: ModuleContext,
}
impl GetEntitiesForUser {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Returns the user's entities, optionally restricted to one vendor type.
	pub async fn execute(&self, user_id: &UserId, module_name: Option<&str>) -> Result<Vec<Entity>> {
		if let Some(name) = module_name {
			self.ctx.registry.get(name)?;
		}

		Ok(self.ctx.entities.find_entities(user_id, module_name).await?)
	}
}

/// Fetches a credential on behalf of its owner.
#[derive(Clone, Debug)]
pub struct GetCredentialForUser {
	ctx: ModuleContext,
}
impl GetCredentialForUser {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Returns the credential; records owned by another user are not found.
	pub async fn execute(&self, credential_id: &CredentialId, user_id: &UserId) -> Result<Credential> {
		self.ctx
			.credentials
			.get_credential(credential_id)
			.await?
			.filter(|credential| credential.user_id.as_ref() == Some(user_id))
			.ok_or_else(|| Error::NotFound { kind: "Credential", id: credential_id.to_string() })
	}
}

async fn owned_entity(ctx: &ModuleContext, entity_id: &EntityId, user_id: &UserId) -> Result<Entity> {
	ctx.entities
		.get_entity(entity_id)
		.await?
		.filter(|entity| &entity.user_id == user_id)
		.ok_or_else(|| Error::NotFound { kind: "Entity", id: entity_id.to_string() })
}
