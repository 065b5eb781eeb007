//! HTTP Basic strategy.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{
		AuthFuture, AuthKind, AuthStrategy, AuthorizationData, AuthorizationRequirements, Secret,
		data_str,
	},
	error::ConfigError,
};

/// Callback-data field names holding the Basic credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthConfig {
	/// Field holding the username (or client key).
	#[serde(default = "BasicAuthConfig::default_username_field")]
	pub username_field: String,
	/// Field holding the password (or secret).
	#[serde(default = "BasicAuthConfig::default_password_field")]
	pub password_field: String,
}
impl BasicAuthConfig {
	fn default_username_field() -> String {
		"username".into()
	}

	fn default_password_field() -> String {
		"password".into()
	}

	/// Overrides both field names.
	pub fn with_fields(username_field: impl Into<String>, password_field: impl Into<String>) -> Self {
		Self { username_field: username_field.into(), password_field: password_field.into() }
	}
}
impl Default for BasicAuthConfig {
	fn default() -> Self {
		Self::with_fields(Self::default_username_field(), Self::default_password_field())
	}
}

#[derive(Clone, Debug)]
struct BasicPair {
	username: String,
	password: Secret,
}

/// Sends `Authorization: Basic` built from a username/password pair; never refreshable.
#[derive(Debug)]
pub struct BasicStrategy {
	config: BasicAuthConfig,
	pair: RwLock<Option<BasicPair>>,
}
impl BasicStrategy {
	/// Builds a strategy holding no credentials.
	pub fn new(config: BasicAuthConfig) -> Self {
		Self { config, pair: RwLock::new(None) }
	}

	/// Replaces the held credentials.
	pub fn with_credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
		*self.pair.write() =
			Some(BasicPair { username: username.into(), password: Secret::new(password) });

		self
	}

	/// Returns the held username.
	pub fn username(&self) -> Option<String> {
		self.pair.read().as_ref().map(|pair| pair.username.clone())
	}
}
impl AuthStrategy for BasicStrategy {
	fn kind(&self) -> AuthKind {
		AuthKind::Basic
	}

	fn add_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
		let guard = self.pair.read();
		let Some(pair) = guard.as_ref() else {
			return Ok(());
		};
		let encoded = STANDARD.encode(format!("{}:{}", pair.username, pair.password.expose()));
		let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);
		headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	fn authorize<'a>(&'a self, data: &'a AuthorizationData) -> AuthFuture<'a> {
		Box::pin(async move {
			let username = data_str(data, &self.config.username_field)?;
			let password = data_str(data, &self.config.password_field)?;

			*self.pair.write() =
				Some(BasicPair { username: username.to_owned(), password: Secret::new(password) });

			Ok(())
		})
	}

	fn has_credentials(&self) -> bool {
		self.pair.read().is_some()
	}

	fn persisted_fields(&self) -> Map<String, Value> {
		let mut fields = Map::new();

		if let Some(pair) = self.pair.read().as_ref() {
			fields.insert(self.config.username_field.clone(), Value::from(pair.username.clone()));
			fields.insert(self.config.password_field.clone(), Value::from(pair.password.clone()));
		}

		fields
	}

	fn lookup_fields(&self) -> Map<String, Value> {
		let mut fields = self.persisted_fields();

		fields.remove(&self.config.password_field);

		fields
	}

	fn restore(&self, fields: &Map<String, Value>) {
		let username = fields.get(&self.config.username_field).and_then(Value::as_str);
		let password = fields.get(&self.config.password_field).and_then(Value::as_str);

		if let (Some(username), Some(password)) = (username, password) {
			*self.pair.write() =
				Some(BasicPair { username: username.to_owned(), password: Secret::new(password) });
		}
	}

	fn clear(&self) {
		self.pair.write().take();
	}

	fn authorization_requirements(&self) -> AuthorizationRequirements {
		AuthorizationRequirements {
			url: None,
			kind: AuthKind::Basic,
			fields: vec![self.config.username_field.clone(), self.config.password_field.clone()],
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn authorize_encodes_configured_fields() {
		let strategy = BasicStrategy::new(BasicAuthConfig::with_fields("clientKey", "secret"));
		let data = AuthorizationData::from_iter([
			("clientKey".to_owned(), Value::from("k")),
			("secret".to_owned(), Value::from("s")),
		]);

		strategy.authorize(&data).await.expect("Basic authorization should succeed.");

		let mut headers = HeaderMap::new();

		strategy.add_auth_headers(&mut headers).expect("Header injection should succeed.");

		assert_eq!(headers[AUTHORIZATION], "Basic azpz");
		assert_eq!(strategy.username().as_deref(), Some("k"));
		assert!(!strategy.lookup_fields().contains_key("secret"));
		assert_eq!(strategy.persisted_fields().len(), 2);
	}

	#[tokio::test]
	async fn authorize_requires_both_fields() {
		let strategy = BasicStrategy::new(BasicAuthConfig::default());
		let data = AuthorizationData::from_iter([("username".to_owned(), Value::from("u"))]);

		assert!(matches!(
			strategy.authorize(&data).await,
			Err(Error::InvalidAuthorizationData { .. })
		));
		assert!(!strategy.has_credentials());
	}

	#[test]
	fn restore_round_trips_persisted_fields() {
		let source = BasicStrategy::new(BasicAuthConfig::default()).with_credentials("u", "p");
		let target = BasicStrategy::new(BasicAuthConfig::default());

		target.restore(&source.persisted_fields());

		assert_eq!(target.username().as_deref(), Some("u"));

		target.clear();

		assert!(!target.has_credentials());
	}
}
