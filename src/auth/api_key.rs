//! Static API-key strategy.

// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{
		AuthFuture, AuthKind, AuthStrategy, AuthorizationData, AuthorizationRequirements, Secret,
		data_str,
	},
	error::ConfigError,
};

/// Where an API key comes from and how it is sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyConfig {
	/// Callback-data (and credential) field holding the key.
	#[serde(default = "ApiKeyConfig::default_field")]
	pub field: String,
	/// Header carrying the key.
	#[serde(default = "ApiKeyConfig::default_header")]
	pub header: String,
	/// Optional value prefix such as `Bearer `.
	#[serde(default)]
	pub prefix: Option<String>,
}
impl ApiKeyConfig {
	fn default_field() -> String {
		"api_key".into()
	}

	fn default_header() -> String {
		"x-api-key".into()
	}

	/// Sets the callback-data field holding the key.
	pub fn with_field(mut self, field: impl Into<String>) -> Self {
		self.field = field.into();

		self
	}

	/// Sets the header carrying the key.
	pub fn with_header(mut self, header: impl Into<String>) -> Self {
		self.header = header.into();

		self
	}

	/// Sets the value prefix.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());

		self
	}
}
impl Default for ApiKeyConfig {
	fn default() -> Self {
		Self { field: Self::default_field(), header: Self::default_header(), prefix: None }
	}
}

/// Sends a static key in a configured header; never refreshable.
#[derive(Debug)]
pub struct ApiKeyStrategy {
	config: ApiKeyConfig,
	header: HeaderName,
	key: RwLock<Option<Secret>>,
}
impl ApiKeyStrategy {
	/// Builds a strategy holding no key.
	pub fn new(config: ApiKeyConfig) -> Result<Self, ConfigError> {
		let header = HeaderName::from_bytes(config.header.as_bytes())
			.map_err(|_| ConfigError::InvalidHeader { name: config.header.clone() })?;

		Ok(Self { config, header, key: RwLock::new(None) })
	}

	/// Replaces the held key.
	pub fn with_key(self, key: impl Into<String>) -> Self {
		*self.key.write() = Some(Secret::new(key));

		self
	}
}
impl AuthStrategy for ApiKeyStrategy {
	fn kind(&self) -> AuthKind {
		AuthKind::ApiKey
	}

	fn add_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
		let guard = self.key.read();
		let Some(key) = guard.as_ref() else {
			return Ok(());
		};
		let prefix = self.config.prefix.as_deref().unwrap_or_default();
		let mut value = HeaderValue::from_str(&format!("{prefix}{}", key.expose()))
			.map_err(|_| ConfigError::InvalidHeader { name: self.config.header.clone() })?;

		value.set_sensitive(true);
		headers.insert(self.header.clone(), value);

		Ok(())
	}

	fn authorize<'a>(&'a self, data: &'a AuthorizationData) -> AuthFuture<'a> {
		Box::pin(async move {
			let key = data_str(data, &self.config.field)?;

			*self.key.write() = Some(Secret::new(key));

			Ok(())
		})
	}

	fn has_credentials(&self) -> bool {
		self.key.read().is_some()
	}

	fn persisted_fields(&self) -> Map<String, Value> {
		self.key
			.read()
			.iter()
			.map(|key| (self.config.field.clone(), Value::from(key.clone())))
			.collect()
	}

	fn restore(&self, fields: &Map<String, Value>) {
		if let Some(key) = fields.get(&self.config.field).and_then(Value::as_str) {
			*self.key.write() = Some(Secret::new(key));
		}
	}

	fn clear(&self) {
		self.key.write().take();
	}

	fn authorization_requirements(&self) -> AuthorizationRequirements {
		AuthorizationRequirements {
			url: None,
			kind: AuthKind::ApiKey,
			fields: vec![self.config.field.clone()],
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn authorize_then_attach_prefixed_header() {
		let strategy = ApiKeyStrategy::new(
			ApiKeyConfig::default().with_header("authorization").with_prefix("Token "),
		)
		.expect("API key strategy should build.");
		let mut headers = HeaderMap::new();

		strategy.add_auth_headers(&mut headers).expect("Headers without a key should succeed.");

		assert!(headers.is_empty());

		let data = AuthorizationData::from_iter([("api_key".to_owned(), Value::from("k-1"))]);

		strategy.authorize(&data).await.expect("Authorization with a key should succeed.");
		strategy.add_auth_headers(&mut headers).expect("Header injection should succeed.");

		assert_eq!(headers["authorization"], "Token k-1");
		assert!(!strategy.is_refreshable());
		assert_eq!(strategy.persisted_fields().get("api_key"), Some(&Value::from("k-1")));
	}

	#[test]
	fn rejects_invalid_header_names() {
		assert!(matches!(
			ApiKeyStrategy::new(ApiKeyConfig::default().with_header("bad header")),
			Err(ConfigError::InvalidHeader { .. })
		));
	}

	#[tokio::test]
	async fn refresh_is_unsupported() {
		let strategy = ApiKeyStrategy::new(ApiKeyConfig::default())
			.expect("API key strategy should build.")
			.with_key("k");
		let err = strategy.refresh(0).await.expect_err("API keys cannot refresh.");

		assert!(matches!(err, Error::Config(ConfigError::RefreshUnsupported { kind: "api_key" })));
	}
}
