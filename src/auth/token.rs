//! OAuth 2.0 bearer-token strategy with single-flight refresh.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use oauth2::{
	AccessToken, RefreshToken, StandardRevocableToken,
	http::{HeaderMap, HeaderValue, header::AUTHORIZATION},
};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{
		AuthFuture, AuthKind, AuthStrategy, AuthorizationData, AuthorizationRequirements, Secret,
		data_str,
	},
	error::ConfigError,
	http::HttpTransport,
	notify::{Notification, NotificationSender, TokenUpdate},
	oauth::{TokenClient, TokenGrant},
	obs::{self, Operation},
};

const STATE_LEN: usize = 32;

/// Credential field holding the access token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";
/// Credential field holding the refresh token.
pub const REFRESH_TOKEN_FIELD: &str = "refresh_token";
/// Credential field holding the access-token expiry as a unix timestamp.
pub const ACCESS_TOKEN_EXPIRES_AT_FIELD: &str = "access_token_expires_at";

/// How the client authenticates to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	#[default]
	Basic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	Post,
}

/// OAuth 2.0 client registration for one vendor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuth2Config {
	/// Registered client identifier.
	pub client_id: String,
	/// Registered client secret.
	#[serde(default)]
	pub client_secret: Option<Secret>,
	/// Consent endpoint.
	pub authorization_uri: Url,
	/// Token endpoint used for code exchange and refresh.
	pub token_uri: Url,
	/// Optional revocation endpoint.
	#[serde(default)]
	pub revocation_uri: Option<Url>,
	/// Redirect URI registered with the vendor.
	#[serde(default)]
	pub redirect_uri: Option<Url>,
	/// Space-delimited scope string.
	#[serde(default)]
	pub scope: Option<String>,
	/// Token endpoint client authentication.
	#[serde(default)]
	pub client_auth: ClientAuthMethod,
}
impl OAuth2Config {
	/// Creates a configuration with the mandatory endpoints.
	pub fn new(client_id: impl Into<String>, authorization_uri: Url, token_uri: Url) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			authorization_uri,
			token_uri,
			revocation_uri: None,
			redirect_uri: None,
			scope: None,
			client_auth: ClientAuthMethod::default(),
		}
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(Secret::new(secret));

		self
	}

	/// Sets the redirect URI.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Sets the space-delimited scope string.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the revocation endpoint.
	pub fn with_revocation_uri(mut self, revocation_uri: Url) -> Self {
		self.revocation_uri = Some(revocation_uri);

		self
	}

	/// Overrides the token endpoint client authentication.
	pub fn with_client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Returns the individual scopes.
	pub fn scopes(&self) -> Vec<String> {
		self.scope
			.as_deref()
			.map(|scope| scope.split_whitespace().map(str::to_owned).collect())
			.unwrap_or_default()
	}

	/// Ensures every endpoint carrying credentials uses HTTPS.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("authorization", &self.authorization_uri)?;
		validate_endpoint("token", &self.token_uri)?;

		if let Some(revocation) = self.revocation_uri.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}

		Ok(())
	}
}

#[derive(Clone, Debug, Default)]
struct TokenState {
	access_token: Option<Secret>,
	refresh_token: Option<Secret>,
	access_token_expires_at: Option<OffsetDateTime>,
}

/// Bearer-token strategy for OAuth 2.0 vendors.
///
/// Refresh is single-flight: concurrent chains that observe a 401 serialize on an async
/// mutex, and a chain whose observed epoch is stale reuses the token obtained by the
/// chain that refreshed first.
pub struct OAuth2Strategy {
	client: TokenClient,
	state: String,
	tokens: RwLock<TokenState>,
	epoch: AtomicU64,
	refresh_guard: AsyncMutex<()>,
	notifications: NotificationSender,
}
impl OAuth2Strategy {
	/// Builds a strategy holding no tokens, with a fresh per-instance `state` value.
	pub fn new(
		config: OAuth2Config,
		transport: Arc<dyn HttpTransport>,
		notifications: NotificationSender,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self {
			client: TokenClient::from_config(&config, transport)?,
			state: rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect(),
			tokens: RwLock::new(TokenState::default()),
			epoch: AtomicU64::new(0),
			refresh_guard: AsyncMutex::new(()),
			notifications,
		})
	}

	/// Seeds the strategy with existing tokens without emitting a notification.
	pub fn with_tokens(self, access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		{
			let mut tokens = self.tokens.write();

			tokens.access_token = Some(Secret::new(access_token));
			tokens.refresh_token = refresh_token.map(Secret::new);
		}

		self.bump_epoch();

		self
	}

	/// Opaque `state` value embedded in this instance's consent URL.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// Returns the access-token expiry, when known.
	pub fn access_token_expires_at(&self) -> Option<OffsetDateTime> {
		self.tokens.read().access_token_expires_at
	}

	/// Returns `true` when the access token is known to have expired at `now`.
	pub fn is_access_token_expired(&self, now: OffsetDateTime) -> bool {
		self.access_token_expires_at().is_some_and(|expires_at| expires_at <= now)
	}

	/// Revokes the held token at the vendor (when an endpoint is configured), drops every
	/// token, and emits [`Notification::TokenDeauthorized`].
	pub async fn revoke(&self) -> Result<bool> {
		let target = {
			let tokens = self.tokens.read();

			match (&tokens.refresh_token, &tokens.access_token) {
				(Some(refresh), _) => Some(StandardRevocableToken::RefreshToken(RefreshToken::new(
					refresh.expose().to_owned(),
				))),
				(None, Some(access)) => Some(StandardRevocableToken::AccessToken(AccessToken::new(
					access.expose().to_owned(),
				))),
				(None, None) => None,
			}
		};
		let revoked = match target {
			Some(token) => self.client.revoke(token).await?,
			None => false,
		};

		self.clear();
		self.notifications.emit(Notification::TokenDeauthorized);

		Ok(revoked)
	}

	fn store_grant(&self, grant: TokenGrant) {
		let expires_at = grant.expires_at(OffsetDateTime::now_utc());
		let access_token = grant.access_token;
		let update = {
			let mut tokens = self.tokens.write();

			tokens.access_token = Some(access_token.clone());
			tokens.access_token_expires_at = expires_at;

			if let Some(refresh) = grant.refresh_token {
				tokens.refresh_token = Some(refresh);
			}

			TokenUpdate {
				access_token,
				refresh_token: tokens.refresh_token.clone(),
				access_token_expires_at: expires_at,
			}
		};

		self.bump_epoch();
		self.notifications.emit(Notification::TokenUpdate(update));
	}

	fn bump_epoch(&self) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
	}

	fn validate_state(&self, data: &AuthorizationData) -> Result<()> {
		match data.get("state").and_then(Value::as_str) {
			Some(returned) if returned != self.state => Err(Error::InvalidAuthorizationData {
				reason: "authorization state mismatch".into(),
			}),
			_ => Ok(()),
		}
	}
}
impl AuthStrategy for OAuth2Strategy {
	fn kind(&self) -> AuthKind {
		AuthKind::OAuth2
	}

	fn add_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
		let tokens = self.tokens.read();
		let Some(access) = tokens.access_token.as_ref() else {
			return Ok(());
		};
		let mut value = HeaderValue::from_str(&format!("Bearer {}", access.expose()))
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);
		headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	fn is_refreshable(&self) -> bool {
		self.tokens.read().refresh_token.is_some()
	}

	fn epoch(&self) -> u64 {
		self.epoch.load(Ordering::Acquire)
	}

	fn refresh(&self, observed_epoch: u64) -> AuthFuture<'_> {
		Box::pin(async move {
			let _guard = self.refresh_guard.lock().await;

			if self.epoch() != observed_epoch {
				tracing::debug!(observed_epoch, "Tokens changed since the 401; skipping refresh.");

				return Ok(());
			}

			let refresh_token = {
				let mut tokens = self.tokens.write();

				tokens.access_token = None;

				tokens.refresh_token.clone()
			}
			.ok_or_else(|| Error::AuthRefresh(ConfigError::MissingRefreshToken.into()))?;
			let grant = obs::observe(
				Operation::Refresh,
				"oauth2.refresh",
				self.client.refresh(&refresh_token),
			)
			.await
			.map_err(Error::AuthRefresh)?;

			self.store_grant(grant);

			Ok(())
		})
	}

	fn authorize<'a>(&'a self, data: &'a AuthorizationData) -> AuthFuture<'a> {
		Box::pin(async move {
			self.validate_state(data)?;

			let code = data_str(data, "code")?;
			let grant = self.client.exchange_code(code).await?;

			self.store_grant(grant);

			Ok(())
		})
	}

	fn has_credentials(&self) -> bool {
		let tokens = self.tokens.read();

		tokens.access_token.is_some() || tokens.refresh_token.is_some()
	}

	fn persisted_fields(&self) -> Map<String, Value> {
		let tokens = self.tokens.read();
		let mut fields = Map::new();

		if let Some(access) = &tokens.access_token {
			fields.insert(ACCESS_TOKEN_FIELD.into(), Value::from(access.clone()));
		}
		if let Some(refresh) = &tokens.refresh_token {
			fields.insert(REFRESH_TOKEN_FIELD.into(), Value::from(refresh.clone()));
		}
		if let Some(expires_at) = tokens.access_token_expires_at {
			fields.insert(
				ACCESS_TOKEN_EXPIRES_AT_FIELD.into(),
				Value::from(expires_at.unix_timestamp()),
			);
		}

		fields
	}

	fn lookup_fields(&self) -> Map<String, Value> {
		let mut fields = self.persisted_fields();

		// The refresh token outlives access tokens, so it alone identifies the grant.
		if fields.contains_key(REFRESH_TOKEN_FIELD) {
			fields.remove(ACCESS_TOKEN_FIELD);
		}

		fields.remove(ACCESS_TOKEN_EXPIRES_AT_FIELD);

		fields
	}

	fn restore(&self, fields: &Map<String, Value>) {
		let text = |key: &str| fields.get(key).and_then(Value::as_str).map(Secret::new);

		{
			let mut tokens = self.tokens.write();

			tokens.access_token = text(ACCESS_TOKEN_FIELD);
			tokens.refresh_token = text(REFRESH_TOKEN_FIELD);
			tokens.access_token_expires_at = fields
				.get(ACCESS_TOKEN_EXPIRES_AT_FIELD)
				.and_then(Value::as_i64)
				.and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());
		}

		self.bump_epoch();
	}

	fn clear(&self) {
		*self.tokens.write() = TokenState::default();

		self.bump_epoch();
	}

	fn revoke(&self) -> AuthFuture<'_, bool> {
		Box::pin(OAuth2Strategy::revoke(self))
	}

	fn authorization_requirements(&self) -> AuthorizationRequirements {
		AuthorizationRequirements {
			url: Some(self.client.authorize_url(&self.state)),
			kind: AuthKind::OAuth2,
			fields: vec!["code".into()],
		}
	}
}
impl Debug for OAuth2Strategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let tokens = self.tokens.read();

		f.debug_struct("OAuth2Strategy")
			.field("has_access_token", &tokens.access_token.is_some())
			.field("has_refresh_token", &tokens.refresh_token.is_some())
			.field("access_token_expires_at", &tokens.access_token_expires_at)
			.field("epoch", &self.epoch())
			.finish()
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		http::{HttpRequest, HttpResponse, TransportFuture},
		notify,
	};

	struct TokenEndpoint {
		body: &'static str,
		status: u16,
		calls: Mutex<usize>,
	}
	impl HttpTransport for TokenEndpoint {
		fn send(&self, _request: HttpRequest) -> TransportFuture<'_> {
			*self.calls.lock() += 1;

			Box::pin(async move {
				let mut response = HttpResponse::new(self.body.as_bytes().to_vec());

				*response.status_mut() = oauth2::http::StatusCode::from_u16(self.status)
					.expect("Fixture status should be valid.");
				response.headers_mut().insert(
					oauth2::http::header::CONTENT_TYPE,
					HeaderValue::from_static("application/json"),
				);

				Ok(response)
			})
		}
	}

	fn endpoint(status: u16, body: &'static str) -> Arc<TokenEndpoint> {
		Arc::new(TokenEndpoint { body, status, calls: Mutex::new(0) })
	}

	fn config() -> OAuth2Config {
		OAuth2Config::new(
			"client",
			Url::parse("https://auth.example.com/authorize").expect("Authorization URL should parse."),
			Url::parse("https://auth.example.com/token").expect("Token URL should parse."),
		)
		.with_client_secret("secret")
	}

	const GRANT: &str =
		r#"{"access_token":"at-2","token_type":"bearer","expires_in":60,"refresh_token":"rt-2"}"#;

	#[test]
	fn rejects_insecure_endpoints() {
		let mut config = config();

		config.token_uri = Url::parse("http://auth.example.com/token").expect("URL should parse.");

		assert!(matches!(
			OAuth2Strategy::new(config, endpoint(200, GRANT), NotificationSender::detached()),
			Err(ConfigError::InsecureEndpoint { endpoint: "token", .. })
		));
	}

	#[test]
	fn each_instance_has_its_own_state() {
		let first = OAuth2Strategy::new(config(), endpoint(200, GRANT), NotificationSender::detached())
			.expect("Strategy should build.");
		let second = OAuth2Strategy::new(config(), endpoint(200, GRANT), NotificationSender::detached())
			.expect("Strategy should build.");

		assert_eq!(first.state().len(), STATE_LEN);
		assert_ne!(first.state(), second.state());

		let requirements = first.authorization_requirements();
		let url = requirements.url.expect("OAuth2 requirements should carry a URL.");

		assert!(url.as_str().contains(first.state()));
	}

	#[tokio::test]
	async fn refresh_stores_tokens_and_notifies() {
		let (tx, mut rx) = notify::channel();
		let transport = endpoint(200, GRANT);
		let strategy = OAuth2Strategy::new(config(), transport.clone(), tx)
			.expect("Strategy should build.")
			.with_tokens("at-1", Some("rt-1".into()));
		let epoch = strategy.epoch();

		assert!(strategy.is_refreshable());

		strategy.refresh(epoch).await.expect("Refresh should succeed.");

		assert_ne!(strategy.epoch(), epoch);
		assert_eq!(*transport.calls.lock(), 1);
		assert!(!strategy.is_access_token_expired(OffsetDateTime::now_utc()));

		let Some(Notification::TokenUpdate(update)) = rx.try_next() else {
			panic!("Refresh should emit a token update.");
		};

		assert_eq!(update.access_token.expose(), "at-2");
		assert_eq!(update.refresh_token.as_ref().map(Secret::expose), Some("rt-2"));
		assert!(update.access_token_expires_at.is_some());
	}

	#[tokio::test]
	async fn stale_epoch_skips_network_refresh() {
		let transport = endpoint(200, GRANT);
		let strategy = OAuth2Strategy::new(config(), transport.clone(), NotificationSender::detached())
			.expect("Strategy should build.")
			.with_tokens("at-1", Some("rt-1".into()));
		let stale = strategy.epoch();

		strategy.refresh(stale).await.expect("First refresh should succeed.");
		strategy.refresh(stale).await.expect("Stale refresh should be skipped.");

		assert_eq!(*transport.calls.lock(), 1);
	}

	#[tokio::test]
	async fn rejected_refresh_surfaces_auth_refresh_error() {
		let strategy = OAuth2Strategy::new(
			config(),
			endpoint(400, r#"{"error":"invalid_grant"}"#),
			NotificationSender::detached(),
		)
		.expect("Strategy should build.")
		.with_tokens("at-1", Some("rt-1".into()));
		let err = strategy.refresh(strategy.epoch()).await.expect_err("Refresh should fail.");

		assert!(matches!(err, Error::AuthRefresh(crate::error::TokenEndpointError::InvalidGrant { .. })));

		let mut headers = HeaderMap::new();

		strategy.add_auth_headers(&mut headers).expect("Header injection should succeed.");

		assert!(headers.is_empty(), "The access token is cleared before refreshing.");
	}

	#[tokio::test]
	async fn authorize_rejects_mismatched_state() {
		let strategy =
			OAuth2Strategy::new(config(), endpoint(200, GRANT), NotificationSender::detached())
				.expect("Strategy should build.");
		let data = AuthorizationData::from_iter([
			("code".to_owned(), Value::from("c")),
			("state".to_owned(), Value::from("forged")),
		]);

		assert!(matches!(
			strategy.authorize(&data).await,
			Err(Error::InvalidAuthorizationData { .. })
		));
	}

	#[test]
	fn persisted_fields_round_trip_through_restore() {
		let build = || {
			OAuth2Strategy::new(config(), endpoint(200, GRANT), NotificationSender::detached())
				.expect("Strategy should build.")
		};
		let source = build().with_tokens("at-1", Some("rt-1".into()));
		let target = build();

		target.restore(&source.persisted_fields());

		assert!(target.is_refreshable());
		assert_eq!(
			target.lookup_fields(),
			Map::from_iter([(REFRESH_TOKEN_FIELD.to_owned(), Value::from("rt-1"))])
		);
	}

	#[tokio::test]
	async fn revoke_without_endpoint_clears_and_notifies() {
		let (tx, mut rx) = notify::channel();
		let transport = endpoint(200, "");
		let strategy = OAuth2Strategy::new(config(), transport.clone(), tx)
			.expect("Strategy should build.")
			.with_tokens("at-1", None);

		assert!(!strategy.revoke().await.expect("Revocation should succeed."));
		assert!(!strategy.has_credentials());
		assert_eq!(rx.try_next(), Some(Notification::TokenDeauthorized));
		assert_eq!(*transport.calls.lock(), 0);
	}
}
