//! Authorization lifecycle orchestrator.
//!
//! A [`Module`] binds one vendor definition to one user. It owns the vendor API object and
//! the receiving half of its notification channel, and keeps persisted credentials and
//! entities consistent with what the live API reports.

pub mod context;
pub mod definition;
pub mod registry;

pub use context::*;
pub use definition::*;
pub use registry::*;

// self
use crate::{
	_prelude::*,
	api::ApiClient,
	auth::{AuthKind, AuthorizationData, AuthorizationRequirements},
	error::ConfigError,
	notify::{self, Notification, NotificationReceiver},
	obs::{self, Operation},
	record::{
		Credential, CredentialFilter, CredentialId, CredentialSelector, CredentialUpdate, Entity,
		EntityDraft, EntityId, UserId,
	},
	store::StoreError,
};

/// Outcome of a successful authorization callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResult {
	/// Credential persisted for the authorization.
	pub credential_id: CredentialId,
	/// Entity the credential backs.
	pub entity_id: EntityId,
	/// Strategy kind that performed the authorization.
	#[serde(rename = "type")]
	pub kind: AuthKind,
}

/// Connection health derived from the persisted credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	/// No credential is associated.
	Unauthenticated,
	/// The credential is believed to work.
	Valid,
	/// The live API rejected the credential.
	Invalid,
}

/// Orchestrator for one (vendor, user) pair.
pub struct Module {
	ctx: ModuleContext,
	definition: Arc<dyn ModuleDefinition>,
	user_id: UserId,
	api: ApiClient,
	notifications: NotificationReceiver,
	credential_id: Option<CredentialId>,
	entity_id: Option<EntityId>,
}
impl Module {
	/// Creates an unauthenticated orchestrator.
	pub fn new(
		ctx: ModuleContext,
		definition: Arc<dyn ModuleDefinition>,
		user_id: UserId,
	) -> Result<Self> {
		let (sender, notifications) = notify::channel();
		let api = ctx.build_api(definition.as_ref(), sender)?;

		Ok(Self { ctx, definition, user_id, api, notifications, credential_id: None, entity_id: None })
	}

	/// Creates an unauthenticated orchestrator for a registered vendor type.
	pub fn for_type(ctx: ModuleContext, module_name: &str, user_id: UserId) -> Result<Self> {
		let definition = ctx.registry.get(module_name)?;

		Self::new(ctx, definition, user_id)
	}

	/// Rebuilds the orchestrator behind a persisted entity, restoring its credential.
	///
	/// Entities owned by another user resolve to [`Error::NotFound`].
	pub async fn load(ctx: ModuleContext, entity_id: &EntityId, user_id: &UserId) -> Result<Self> {
		let entity = ctx
			.entities
			.get_entity(entity_id)
			.await?
			.filter(|entity| &entity.user_id == user_id)
			.ok_or_else(|| Error::NotFound { kind: "Entity", id: entity_id.to_string() })?;
		let definition = ctx.registry.get(&entity.module_name)?;
		let mut module = Self::new(ctx, definition, user_id.clone())?;

		module.entity_id = Some(entity.id.clone());

		if let Some(credential_id) = &entity.credential_id {
			match module.ctx.credentials.get_credential(credential_id).await? {
				Some(credential) => {
					module.api.auth().restore(&credential.fields);
					module.credential_id = Some(credential.id);
				},
				None => {
					tracing::warn!(
						entity = %entity.id,
						credential = %credential_id,
						"Entity references a missing credential."
					);
				},
			}
		}

		Ok(module)
	}

	/// Vendor definition.
	pub fn definition(&self) -> &Arc<dyn ModuleDefinition> {
		&self.definition
	}

	/// Vendor type name.
	pub fn module_name(&self) -> &str {
		self.definition.module_name()
	}

	/// Owning user.
	pub fn user_id(&self) -> &UserId {
		&self.user_id
	}

	/// Vendor API object.
	pub fn api(&self) -> &ApiClient {
		&self.api
	}

	/// Credential currently associated, if any.
	pub fn credential_id(&self) -> Option<&CredentialId> {
		self.credential_id.as_ref()
	}

	/// Entity currently associated, if any.
	pub fn entity_id(&self) -> Option<&EntityId> {
		self.entity_id.as_ref()
	}

	/// Loads the associated entity record.
	pub async fn entity(&self) -> Result<Option<Entity>> {
		match &self.entity_id {
			Some(id) => Ok(self.ctx.entities.get_entity(id).await?),
			None => Ok(None),
		}
	}

	/// Loads the associated credential record.
	pub async fn credential(&self) -> Result<Option<Credential>> {
		match &self.credential_id {
			Some(id) => Ok(self.ctx.credentials.get_credential(id).await?),
			None => Ok(None),
		}
	}

	/// Derives the connection state from the persisted credential.
	pub async fn state(&self) -> Result<ConnectionState> {
		Ok(match self.credential().await? {
			None => ConnectionState::Unauthenticated,
			Some(credential) if credential.auth_is_valid => ConnectionState::Valid,
			Some(_) => ConnectionState::Invalid,
		})
	}

	/// What the caller must collect before authorizing.
	pub fn authorization_requirements(&self) -> AuthorizationRequirements {
		self.api.auth().authorization_requirements()
	}

	/// Like [`Self::authorization_requirements`] but rejects OAuth2 requirements lacking a URL.
	pub fn validate_authorization_requirements(&self) -> Result<AuthorizationRequirements> {
		let requirements = self.authorization_requirements();

		if requirements.kind == AuthKind::OAuth2 && requirements.url.is_none() {
			return Err(ConfigError::MissingAuthorizationUrl {
				module: self.module_name().to_owned(),
			}
			.into());
		}

		Ok(requirements)
	}

	/// Runs the vendor probe; any error counts as failure.
	pub async fn test_auth(&self) -> bool {
		match obs::observe(Operation::TestAuth, "module.test_auth", self.definition.test_auth(&self.api))
			.await
		{
			Ok(passed) => passed,
			Err(e) => {
				tracing::warn!(module = self.module_name(), error = %e, "Authentication probe failed.");

				false
			},
		}
	}

	/// Applies an authorization callback and links the resulting credential to an entity.
	///
	/// Nothing is persisted unless the vendor probe passes. Repeating the callback for the same
	/// external account reuses both records.
	pub async fn process_authorization_callback(
		&mut self,
		data: &AuthorizationData,
	) -> Result<AuthorizationResult> {
		obs::observe(Operation::AuthorizationCallback, "module.authorization_callback", async {
			// Records are located by what the vendor reports, never by what this instance
			// held before. The strategy keeps its consent `state`.
			self.api.auth().clear();
			self.notifications.drain();
			self.credential_id = None;
			self.entity_id = None;

			let kind = self.api.auth().kind();

			obs::observe(Operation::Authorize, "module.authorize", self.api.auth().authorize(data))
				.await?;

			if !self.test_auth().await {
				let dropped = self.notifications.drain();

				tracing::debug!(dropped = dropped.len(), "Discarding events of a failed authorization.");

				return Err(Error::AuthorizationFailed { module: self.module_name().to_owned() });
			}

			// OAuth2 announces its tokens through the channel; static strategies persist directly.
			if kind != AuthKind::OAuth2 {
				self.on_token_update().await?;
			}

			self.process_notifications().await?;

			let credential_id = self
				.credential_id
				.clone()
				.ok_or_else(|| Error::AuthorizationFailed { module: self.module_name().to_owned() })?;
			let details =
				self.definition.entity_details(&self.api, data, &self.user_id).await?;
			let entity = self
				.ctx
				.entities
				.find_or_create_entity(EntityDraft::new(
					self.user_id.clone(),
					self.module_name(),
					details,
					Some(credential_id.clone()),
				))
				.await?;

			tracing::info!(
				module = self.module_name(),
				entity = %entity.id,
				credential = %credential_id,
				"Authorization completed."
			);

			self.entity_id = Some(entity.id.clone());

			Ok(AuthorizationResult { credential_id, entity_id: entity.id, kind })
		})
		.await
	}

	/// Persists the strategy's current auth material, marking the credential valid.
	///
	/// The known credential is updated in place; otherwise the vendor identifiers (or the
	/// strategy's lookup fields when the vendor supplies none) locate the record to merge.
	pub async fn on_token_update(&mut self) -> Result<Credential> {
		obs::observe(Operation::TokenUpdate, "module.token_update", async {
			let details = self.definition.credential_details(&self.api, &self.user_id).await?;
			let selector = match &self.credential_id {
				Some(id) => CredentialSelector::Id(id.clone()),
				None if details.identifiers.is_empty() => CredentialSelector::Filter(CredentialFilter {
					user_id: Some(self.user_id.clone()),
					fields: self.api.auth().lookup_fields(),
				}),
				None => CredentialSelector::Filter(CredentialFilter::from_identifiers(
					Some(self.user_id.clone()),
					&details.identifiers,
				)),
			};
			let mut update = CredentialUpdate::from_details(Some(self.user_id.clone()), details)
				.with_auth_is_valid(true);

			update.fields.extend(self.api.auth().persisted_fields());

			let credential = self.ctx.credentials.upsert_credential(selector, update).await?;

			tracing::debug!(credential = %credential.id, "Credential persisted.");

			self.credential_id = Some(credential.id.clone());

			Ok(credential)
		})
		.await
	}

	/// Flags the associated credential as rejected by the live API.
	///
	/// Without a known credential, the strategy's lookup fields search the user's credentials:
	/// no match is a no-op and several matches fail with an ambiguous-record error.
	pub async fn mark_credentials_invalid(&mut self) -> Result<Option<Credential>> {
		obs::observe(Operation::MarkInvalid, "module.mark_invalid", async {
			let mut target = self.credential_id.clone();

			if target.is_none()
				&& let Some(entity) = self.entity().await?
			{
				target = entity.credential_id;
			}
			if target.is_none() && self.api.auth().has_credentials() {
				let filter = CredentialFilter {
					user_id: Some(self.user_id.clone()),
					fields: self.api.auth().lookup_fields(),
				};
				let mut matches = self.ctx.credentials.find_credentials(&filter).await?;

				if matches.len() > 1 {
					return Err(StoreError::ambiguous_credential(&filter).into());
				}

				target = matches.pop().map(|credential| credential.id);
			}

			let Some(id) = target else {
				tracing::debug!(module = self.module_name(), "No credential to invalidate.");

				return Ok(None);
			};
			let updated = self.ctx.credentials.set_credential_validity(&id, false).await?;

			if updated.is_some() {
				tracing::info!(credential = %id, "Credential marked invalid.");

				self.credential_id = Some(id);
			}

			Ok(updated)
		})
		.await
	}

	/// Drops the credential and resets the API object; the entity survives without one.
	pub async fn deauthorize(&mut self) -> Result<()> {
		obs::observe(Operation::Deauthorize, "module.deauthorize", async {
			let mut target = self.credential_id.take();

			if target.is_none()
				&& let Some(entity) = self.entity().await?
			{
				target = entity.credential_id;
			}

			self.api.auth().clear();
			self.reset_api()?;

			if let Some(id) = &target {
				self.ctx.credentials.delete_credential(id).await?;
			}
			if let Some(entity_id) = &self.entity_id {
				self.ctx.entities.set_entity_credential(entity_id, None).await?;
			}

			tracing::info!(module = self.module_name(), "Module deauthorized.");

			Ok(())
		})
		.await
	}

	/// Revokes the held credentials at the vendor, then deauthorizes.
	///
	/// Returns `true` when the vendor acknowledged a revocation request.
	pub async fn revoke(&mut self) -> Result<bool> {
		let revoked = self.api.auth().revoke().await?;

		self.process_notifications().await?;

		if self.credential_id.is_some() {
			self.deauthorize().await?;
		}

		Ok(revoked)
	}

	/// Applies every queued lifecycle event in emission order, returning how many ran.
	pub async fn process_notifications(&mut self) -> Result<usize> {
		let mut handled = 0;

		while let Some(notification) = self.notifications.try_next() {
			tracing::debug!(notification = notification.tag(), "Handling notification.");

			match notification {
				Notification::InvalidAuth => {
					self.mark_credentials_invalid().await?;
				},
				Notification::TokenUpdate(_) => {
					self.on_token_update().await?;
				},
				Notification::TokenDeauthorized => self.deauthorize().await?,
			}

			handled += 1;
		}

		Ok(handled)
	}

	fn reset_api(&mut self) -> Result<()> {
		let (sender, notifications) = notify::channel();

		self.api = self.ctx.build_api(self.definition.as_ref(), sender)?;
		self.notifications = notifications;

		Ok(())
	}
}
impl Debug for Module {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Module")
			.field("module_name", &self.module_name())
			.field("user_id", &self.user_id)
			.field("credential_id", &self.credential_id)
			.field("entity_id", &self.entity_id)
			.finish()
	}
}
