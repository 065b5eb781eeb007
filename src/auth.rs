//! Auth strategies: API key, HTTP Basic, and OAuth 2.0 bearer tokens.

pub mod api_key;
pub mod basic;
pub mod secret;
pub mod strategy;
pub mod token;

pub use api_key::*;
pub use basic::*;
pub use secret::*;
pub use strategy::*;
pub use token::*;

// self
use crate::{_prelude::*, http::HttpTransport, notify::NotificationSender};

/// Vendor-specific authorization input (OAuth2 `code`, API key, basic-auth fields).
pub type AuthorizationData = Map<String, Value>;

/// Declarative auth configuration a module definition exposes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
	/// OAuth 2.0 authorization-code flow with refreshable bearer tokens.
	#[serde(rename = "oauth2")]
	OAuth2(OAuth2Config),
	/// Static API key sent in a header.
	ApiKey(ApiKeyConfig),
	/// HTTP Basic username/password pair.
	Basic(BasicAuthConfig),
}
impl AuthConfig {
	/// Returns the strategy kind this configuration builds.
	pub fn kind(&self) -> AuthKind {
		match self {
			Self::OAuth2(_) => AuthKind::OAuth2,
			Self::ApiKey(_) => AuthKind::ApiKey,
			Self::Basic(_) => AuthKind::Basic,
		}
	}

	/// Builds a fresh strategy holding no auth material.
	pub fn build(
		&self,
		transport: Arc<dyn HttpTransport>,
		notifications: NotificationSender,
	) -> Result<Arc<dyn AuthStrategy>> {
		Ok(match self {
			Self::OAuth2(config) =>
				Arc::new(OAuth2Strategy::new(config.clone(), transport, notifications)?),
			Self::ApiKey(config) => Arc::new(ApiKeyStrategy::new(config.clone())?),
			Self::Basic(config) => Arc::new(BasicStrategy::new(config.clone())),
		})
	}
}

pub(crate) fn data_str<'a>(data: &'a AuthorizationData, key: &str) -> Result<&'a str> {
	match data.get(key) {
		Some(Value::String(value)) if !value.is_empty() => Ok(value),
		Some(_) => Err(Error::InvalidAuthorizationData {
			reason: format!("`{key}` must be a non-empty string"),
		}),
		None => Err(Error::InvalidAuthorizationData { reason: format!("`{key}` is missing") }),
	}
}
