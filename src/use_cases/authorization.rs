//! Use cases that change authorization state.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationData, AuthorizationRequirements},
	module::{AuthorizationResult, Module, ModuleContext},
	record::{EntityId, UserId},
};

/// Completes a vendor authorization for a user.
#[derive(Clone, Debug)]
pub struct ProcessAuthorizationCallback {
	ctx: ModuleContext,
}
impl ProcessAuthorizationCallback {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Authorizes `module_name` for `user_id` with the callback payload.
	pub async fn execute(
		&self,
		user_id: &UserId,
		module_name: &str,
		data: &AuthorizationData,
	) -> Result<AuthorizationResult> {
		let mut module = Module::for_type(self.ctx.clone(), module_name, user_id.clone())?;

		module.process_authorization_callback(data).await
	}
}

/// Re-runs the vendor probe for a connected entity.
#[derive(Clone, Debug)]
pub struct TestModuleAuth {
	ctx: ModuleContext,
}
impl TestModuleAuth {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Returns whether the entity's credential still works; a rejection is persisted.
	pub async fn execute(&self, entity_id: &EntityId, user_id: &UserId) -> Result<bool> {
		let mut module = Module::load(self.ctx.clone(), entity_id, user_id).await?;
		let passed = module.test_auth().await;

		module.process_notifications().await?;

		Ok(passed)
	}
}

/// Reports what a user must supply to authorize a vendor.
#[derive(Clone, Debug)]
pub struct GetAuthorizationRequirements {
	ctx: ModuleContext,
}
impl GetAuthorizationRequirements {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Returns validated requirements for `module_name`.
	pub fn execute(&self, user_id: &UserId, module_name: &str) -> Result<AuthorizationRequirements> {
		Module::for_type(self.ctx.clone(), module_name, user_id.clone())?
			.validate_authorization_requirements()
	}
}

/// Disconnects an entity by removing its credential.
#[derive(Clone, Debug)]
pub struct DeauthorizeModule {
	ctx: ModuleContext,
}
impl DeauthorizeModule {
	/// Creates the use case.
	pub fn new(ctx: ModuleContext) -> Self {
		Self { ctx }
	}

	/// Deletes the entity's credential; the entity record is kept.
	pub async fn execute(&self, entity_id: &EntityId, user_id: &UserId) -> Result<()> {
		Module::load(self.ctx.clone(), entity_id, user_id).await?.deauthorize().await
	}
}
