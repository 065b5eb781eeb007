//! Vendor definitions plugged into the orchestrator.

// self
use crate::{
	_prelude::*,
	api::ApiClient,
	auth::{AuthConfig, AuthorizationData},
	record::{EntityDetails, RecordDetails, UserId},
};

/// Boxed future returned by definition hooks.
pub type DefinitionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Everything the orchestrator needs to know about one vendor.
///
/// Hooks receive the live [`ApiClient`]; any request they issue goes through the shared
/// executor, so a 401 inside a hook is reported like any other vendor call.
pub trait ModuleDefinition
where
	Self: 'static + Send + Sync,
{
	/// Vendor type name (registry key, stored on entities).
	fn module_name(&self) -> &str;

	/// Auth configuration used to build the strategy.
	fn auth_config(&self) -> &AuthConfig;

	/// Base URL relative request paths are joined onto.
	fn base_url(&self) -> Option<&Url> {
		None
	}

	/// Probe confirming that freshly applied credentials work.
	fn test_auth<'a>(&'a self, api: &'a ApiClient) -> DefinitionFuture<'a, bool>;

	/// Identity of the external account behind the authorization.
	fn entity_details<'a>(
		&'a self,
		api: &'a ApiClient,
		data: &'a AuthorizationData,
		user_id: &'a UserId,
	) -> DefinitionFuture<'a, EntityDetails>;

	/// Identifying keys and details of the credential.
	fn credential_details<'a>(
		&'a self,
		api: &'a ApiClient,
		user_id: &'a UserId,
	) -> DefinitionFuture<'a, RecordDetails>;
}
