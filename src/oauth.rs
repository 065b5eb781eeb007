//! OAuth 2.0 token endpoint client built on the `oauth2` crate.
//!
//! The client reaches the network through the crate's [`HttpTransport`], so token
//! exchanges share the transport (and test doubles) used by vendor requests.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet,
	EndpointNotSet, EndpointSet, ErrorResponseType, RedirectUrl, RefreshToken, RequestTokenError,
	RevocationErrorResponseType, RevocationUrl, Scope, StandardErrorResponse, StandardRevocableToken,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponseType},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientAuthMethod, OAuth2Config, Secret},
	error::{ConfigError, TokenEndpointError, TransportError},
	http::{HttpTransport, TransportHandle},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointMaybeSet, EndpointSet>;
type TokenFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TokenEndpointError>> + 'a + Send>>;

/// Tokens returned by a successful exchange or refresh.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Issued access token.
	pub access_token: Secret,
	/// Issued refresh token, when the provider rotated or granted one.
	pub refresh_token: Option<Secret>,
	/// Lifetime of the access token, when reported.
	pub expires_in: Option<StdDuration>,
}
impl TokenGrant {
	/// Converts the relative lifetime into an absolute expiry.
	pub fn expires_at(&self, issued_at: OffsetDateTime) -> Option<OffsetDateTime> {
		let lifetime = Duration::try_from(self.expires_in?).ok()?;

		issued_at.checked_add(lifetime)
	}
}

pub(crate) struct TokenClient {
	oauth_client: ConfiguredBasicClient,
	http: TransportHandle,
	scopes: Vec<String>,
}
impl TokenClient {
	pub(crate) fn from_config(
		config: &OAuth2Config,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let auth_url = AuthUrl::new(config.authorization_uri.to_string())
			.map_err(|source| ConfigError::invalid_url(config.authorization_uri.as_str(), source))?;
		let token_url = TokenUrl::new(config.token_uri.to_string())
			.map_err(|source| ConfigError::invalid_url(config.token_uri.as_str(), source))?;
		let revocation_url = config
			.revocation_uri
			.as_ref()
			.map(|uri| {
				RevocationUrl::new(uri.to_string())
					.map_err(|source| ConfigError::invalid_url(uri.as_str(), source))
			})
			.transpose()?;
		let mut oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_revocation_url_option(revocation_url);

		if let Some(secret) = &config.client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if let Some(redirect) = &config.redirect_uri {
			let redirect_url = RedirectUrl::new(redirect.to_string())
				.map_err(|source| ConfigError::invalid_url(redirect.as_str(), source))?;

			oauth_client = oauth_client.set_redirect_uri(redirect_url);
		}
		if matches!(config.client_auth, ClientAuthMethod::Post) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			http: TransportHandle::new(transport),
			scopes: config.scopes(),
		})
	}

	/// Builds the consent URL carrying `client_id`, `redirect_uri`, `scope`, `state`, and
	/// `response_type=code`.
	pub(crate) fn authorize_url(&self, state: &str) -> Url {
		let mut request = self.oauth_client.authorize_url(|| CsrfToken::new(state.to_owned()));

		for scope in &self.scopes {
			request = request.add_scope(Scope::new(scope.clone()));
		}

		request.url().0
	}

	pub(crate) fn exchange_code<'a>(&'a self, code: &'a str) -> TokenFuture<'a, TokenGrant> {
		Box::pin(async move {
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&self.http)
				.await
				.map_err(|err| map_request_error(err, self.http.take_status(), |kind| Some(kind)))?;

			Ok(map_token_response(response))
		})
	}

	pub(crate) fn refresh<'a>(&'a self, refresh_token: &'a Secret) -> TokenFuture<'a, TokenGrant> {
		Box::pin(async move {
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&self.http)
				.await
				.map_err(|err| map_request_error(err, self.http.take_status(), |kind| Some(kind)))?;

			Ok(map_token_response(response))
		})
	}

	/// Posts the token to the revocation endpoint; a missing endpoint is a no-op.
	pub(crate) fn revoke(&self, token: StandardRevocableToken) -> TokenFuture<'_, bool> {
		Box::pin(async move {
			let Some(uri) = self.oauth_client.revocation_url() else {
				return Ok(false);
			};
			let request = self.oauth_client.revoke_token(token).map_err(|_| {
				ConfigError::InsecureEndpoint { endpoint: "revocation", url: uri.url().to_string() }
			})?;

			request.request_async(&self.http).await.map_err(|err| {
				map_request_error(err, self.http.take_status(), |kind| match kind {
					RevocationErrorResponseType::Basic(kind) => Some(kind),
					_ => None,
				})
			})?;

			Ok(true)
		})
	}
}

fn map_token_response(response: oauth2::basic::BasicTokenResponse) -> TokenGrant {
	TokenGrant {
		access_token: Secret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|token| Secret::new(token.secret().to_owned())),
		expires_in: response.expires_in(),
	}
}

fn map_request_error<T>(
	err: RequestTokenError<TransportError, StandardErrorResponse<T>>,
	status: Option<u16>,
	basic_kind: impl FnOnce(&T) -> Option<&BasicErrorResponseType>,
) -> TokenEndpointError
where
	T: ErrorResponseType + AsRef<str> + std::fmt::Display,
{
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = response
				.error_description()
				.cloned()
				.unwrap_or_else(|| response.error().as_ref().to_owned());

			match basic_kind(response.error()) {
				Some(BasicErrorResponseType::InvalidGrant) => TokenEndpointError::InvalidGrant { reason },
				Some(BasicErrorResponseType::InvalidClient) =>
					TokenEndpointError::InvalidClient { reason },
				_ => TokenEndpointError::Rejected { reason, status },
			}
		},
		RequestTokenError::Request(error) => TokenEndpointError::Transport(error),
		RequestTokenError::Parse(error, _body) =>
			TokenEndpointError::Malformed { source: Box::new(error) },
		RequestTokenError::Other(message) => TokenEndpointError::Rejected {
			reason: format!("unexpected response: {message}"),
			status,
		},
	}
}
