//! Shared dependencies for orchestrators and use cases.

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	api::ApiClient,
	http::HttpTransport,
	module::{ModuleDefinition, ModuleRegistry},
	notify::NotificationSender,
	request::{BackoffPolicy, RequestExecutor, Sleeper, TokioSleeper},
	store::{CredentialStore, EntityStore},
};

/// Dependency bundle: registry, stores, transport, and retry pacing.
#[derive(Clone)]
pub struct ModuleContext {
	/// Vendor definitions.
	pub registry: Arc<ModuleRegistry>,
	/// Credential persistence.
	pub credentials: Arc<dyn CredentialStore>,
	/// Entity persistence.
	pub entities: Arc<dyn EntityStore>,
	/// HTTP transport shared by every vendor API object.
	pub transport: Arc<dyn HttpTransport>,
	/// Backoff sleeper.
	pub sleeper: Arc<dyn Sleeper>,
	/// Backoff schedule.
	pub backoff: BackoffPolicy,
}
impl ModuleContext {
	/// Builds a context on the default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(
		registry: ModuleRegistry,
		credentials: Arc<dyn CredentialStore>,
		entities: Arc<dyn EntityStore>,
	) -> Self {
		Self::with_transport(registry, credentials, entities, Arc::new(ReqwestTransport::default()))
	}

	/// Builds a context on a caller-supplied transport.
	pub fn with_transport(
		registry: ModuleRegistry,
		credentials: Arc<dyn CredentialStore>,
		entities: Arc<dyn EntityStore>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self {
			registry: Arc::new(registry),
			credentials,
			entities,
			transport,
			sleeper: Arc::new(TokioSleeper),
			backoff: BackoffPolicy::default(),
		}
	}

	/// Overrides the backoff sleeper.
	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Overrides the backoff schedule.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;

		self
	}

	/// Builds a vendor API object holding no auth material.
	pub(crate) fn build_api(
		&self,
		definition: &dyn ModuleDefinition,
		notifications: NotificationSender,
	) -> Result<ApiClient> {
		let auth = definition.auth_config().build(self.transport.clone(), notifications.clone())?;
		let mut executor = RequestExecutor::new(self.transport.clone(), auth)
			.with_backoff(self.backoff.clone())
			.with_sleeper(self.sleeper.clone())
			.with_notifications(notifications);

		if let Some(base_url) = definition.base_url() {
			executor = executor.with_base_url(base_url.clone());
		}

		Ok(ApiClient::new(executor))
	}
}
impl Debug for ModuleContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ModuleContext")
			.field("registry", &self.registry)
			.field("backoff", &self.backoff)
			.finish()
	}
}
