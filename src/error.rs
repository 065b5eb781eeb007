//! Crate-level error types shared by the executor, auth strategies, stores, and orchestrator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure, including ambiguous record matches.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A vendor request failed after the executor exhausted its recovery options.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// Token endpoint rejected an authorization-code exchange or could not be reached.
	#[error(transparent)]
	TokenEndpoint(#[from] TokenEndpointError),
	/// Refreshing the access token failed; callers treat this as an unrecoverable 401.
	#[error("Access token refresh failed.")]
	AuthRefresh(#[source] TokenEndpointError),

	/// The post-authorization probe did not confirm working credentials.
	#[error("Authorization failed for module `{module}`.")]
	AuthorizationFailed {
		/// Module (vendor) name that rejected the probe.
		module: String,
	},
	/// No module definition is registered for the requested vendor type.
	#[error("No module definition is registered for `{name}`.")]
	UnknownModule {
		/// Requested vendor type.
		name: String,
	},
	/// A record was not found or does not belong to the requesting user.
	#[error("{kind} `{id}` was not found.")]
	NotFound {
		/// Record kind (credential, entity).
		kind: &'static str,
		/// Identifier that failed to resolve.
		id: String,
	},
	/// A successful response declared JSON but its body did not parse.
	#[error("Response body (HTTP {status}) is not valid JSON.")]
	ResponseDecode {
		/// HTTP status of the response.
		status: u16,
		/// Parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// The authorization callback payload is missing required input.
	#[error("Authorization data is invalid: {reason}.")]
	InvalidAuthorizationData {
		/// Human-readable description of the missing or malformed input.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the failure came from a store search matching several records.
	pub fn is_ambiguous_record(&self) -> bool {
		matches!(self, Self::Storage(crate::store::StoreError::AmbiguousRecord { .. }))
	}

	/// Returns the request failure classification, if the error came from the executor.
	pub fn request_kind(&self) -> Option<RequestErrorKind> {
		match self {
			Self::Request(err) => Some(err.kind),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured or requested URL could not be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints carrying credentials must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A header name or value is not valid HTTP.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// A relative request path was used without a base URL.
	#[error("Relative path `{path}` requires a base URL.")]
	MissingBaseUrl {
		/// Relative path supplied by the caller.
		path: String,
	},
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	BodyEncoding(#[source] serde_json::Error),
	/// The auth strategy has no refresh capability.
	#[error("The {kind} auth strategy cannot refresh credentials.")]
	RefreshUnsupported {
		/// Auth strategy label.
		kind: &'static str,
	},
	/// Held auth material lacks a refresh token.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// OAuth2 authorization requires a consent URL.
	#[error("Module `{module}` requires an authorization URL.")]
	MissingAuthorizationUrl {
		/// Module name.
		module: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { url: url.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) reported by an [`HttpTransport`](crate::http::HttpTransport).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Connection was reset, refused, or dropped; safe to retry.
	#[error("Connection failed while calling the remote API.")]
	Connection {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for the remote API.
	#[error("Request to the remote API timed out.")]
	Timeout {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Any other transport failure; not retried.
	#[error("Transport error occurred while calling the remote API.")]
	Other {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a connection-class failure.
	pub fn connection(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connection { source: Box::new(src) }
	}

	/// Wraps a timeout failure.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Wraps any other transport failure.
	pub fn other(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Other { source: Box::new(src) }
	}

	/// Returns `true` for the connection-reset class the executor retries.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Connection { .. })
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		use std::io::ErrorKind;

		match e.kind() {
			ErrorKind::ConnectionReset
			| ErrorKind::ConnectionAborted
			| ErrorKind::ConnectionRefused
			| ErrorKind::BrokenPipe
			| ErrorKind::UnexpectedEof => Self::connection(e),
			ErrorKind::TimedOut => Self::timeout(e),
			_ => Self::other(e),
		}
	}
}

/// Classification of a failed request chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestErrorKind {
	/// Connection-level failure that outlived the backoff budget (or was not retryable).
	Transport,
	/// 429 or 5xx that outlived the backoff budget.
	RetryableHttp,
	/// 401 that could not be recovered by a refresh.
	AuthFailure,
	/// Any other 4xx; never retried.
	FatalHttp,
}
impl RequestErrorKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Transport => "transport_error",
			Self::RetryableHttp => "retryable_http_error",
			Self::AuthFailure => "auth_failure",
			Self::FatalHttp => "fatal_http_error",
		}
	}
}
impl Display for RequestErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Terminal failure of one logical request chain, with enough context for diagnostics.
#[derive(Debug, ThisError)]
#[error(
	"{method} {url} failed with {kind}{}.",
	.status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
)]
pub struct RequestError {
	/// Failure classification.
	pub kind: RequestErrorKind,
	/// HTTP method of the failed request.
	pub method: String,
	/// Fully encoded request URL.
	pub url: String,
	/// HTTP status of the final response, when one was received.
	pub status: Option<u16>,
	/// Truncated response body of the final response, when one was received.
	pub body_preview: Option<String>,
	/// Underlying transport or refresh failure, when any.
	#[source]
	pub source: Option<BoxError>,
}
impl RequestError {
	const BODY_PREVIEW_LIMIT: usize = 256;

	pub(crate) fn new(kind: RequestErrorKind, method: impl Into<String>, url: impl Into<String>) -> Self {
		Self { kind, method: method.into(), url: url.into(), status: None, body_preview: None, source: None }
	}

	pub(crate) fn with_response(mut self, status: u16, body: &[u8]) -> Self {
		self.status = Some(status);

		if !body.is_empty() {
			self.body_preview = Some(truncate_preview(String::from_utf8_lossy(body).into_owned()));
		}

		self
	}

	pub(crate) fn with_source(mut self, source: impl 'static + Send + Sync + std::error::Error) -> Self {
		self.source = Some(Box::new(source));

		self
	}
}

/// Failures raised while talking to an OAuth 2.0 token or revocation endpoint.
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// Provider rejected the grant (bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Provider returned some other OAuth error or an unexpected response.
	#[error("Token endpoint returned an error: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with a body that could not be parsed.
	#[error("Token endpoint returned a malformed response.")]
	Malformed {
		/// Parsing failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token request could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

pub(crate) fn truncate_preview(body: String) -> String {
	if body.chars().count() <= RequestError::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= RequestError::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}

		buf.push(ch);
	}

	buf
}
