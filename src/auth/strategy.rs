//! The capability interface every auth strategy implements.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::{_prelude::*, auth::AuthorizationData, error::ConfigError};

/// Boxed future returned by fallible strategy operations.
pub type AuthFuture<'a, T = ()> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Auth strategy family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthKind {
	/// OAuth 2.0 bearer tokens.
	#[serde(rename = "oauth2")]
	OAuth2,
	/// Static API key.
	#[serde(rename = "api_key")]
	ApiKey,
	/// HTTP Basic credentials.
	#[serde(rename = "basic")]
	Basic,
}
impl AuthKind {
	/// Returns a stable label suitable for logs and payloads.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::OAuth2 => "oauth2",
			Self::ApiKey => "api_key",
			Self::Basic => "basic",
		}
	}
}
impl Display for AuthKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// What a caller must collect from the user to authorize a module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequirements {
	/// Consent URL to redirect the user to (OAuth2 only).
	pub url: Option<Url>,
	/// Strategy family.
	#[serde(rename = "type")]
	pub kind: AuthKind,
	/// Keys the authorization callback payload must carry.
	pub fields: Vec<String>,
}

/// Capability interface consumed by the request executor and the orchestrator.
///
/// Strategies own their auth material behind interior mutability so one instance can be
/// shared (via `Arc`) by every request issued through the same vendor API object.
pub trait AuthStrategy
where
	Self: Send + Sync,
{
	/// Strategy family.
	fn kind(&self) -> AuthKind;

	/// Attaches authorization headers; leaves `headers` untouched when no material is held.
	fn add_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), ConfigError>;

	/// Returns `true` when [`refresh`](AuthStrategy::refresh) can recover a 401.
	fn is_refreshable(&self) -> bool {
		false
	}

	/// Monotonic counter bumped whenever the held material changes.
	///
	/// The executor reads it before sending; [`refresh`](AuthStrategy::refresh) compares it
	/// to detect that a concurrent chain already refreshed.
	fn epoch(&self) -> u64 {
		0
	}

	/// Obtains new material after a 401 observed at `observed_epoch`.
	fn refresh(&self, observed_epoch: u64) -> AuthFuture<'_> {
		let _ = observed_epoch;
		let kind = self.kind().as_str();

		Box::pin(async move { Err(Error::from(ConfigError::RefreshUnsupported { kind })) })
	}

	/// Turns the authorization callback payload into held material.
	fn authorize<'a>(&'a self, data: &'a AuthorizationData) -> AuthFuture<'a>;

	/// Returns `true` when the strategy holds material to authenticate with.
	fn has_credentials(&self) -> bool;

	/// Auth fields persisted with the credential record.
	fn persisted_fields(&self) -> Map<String, Value>;

	/// Fields that identify the held material among stored credentials.
	fn lookup_fields(&self) -> Map<String, Value> {
		self.persisted_fields()
	}

	/// Restores material from a persisted credential document.
	fn restore(&self, fields: &Map<String, Value>);

	/// Drops every piece of held material.
	fn clear(&self);

	/// Revokes the held material at the vendor when supported, then drops it.
	///
	/// Resolves to `true` when a vendor endpoint confirmed the revocation.
	fn revoke(&self) -> AuthFuture<'_, bool> {
		self.clear();

		Box::pin(async { Ok(false) })
	}

	/// Describes what the authorization callback needs.
	fn authorization_requirements(&self) -> AuthorizationRequirements;
}
