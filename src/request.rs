//! Request description, execution, and response handling for vendor APIs.

pub mod backoff;
pub mod executor;
pub mod response;

pub use backoff::*;
pub use executor::*;
pub use response::*;

// crates.io
use oauth2::http::{
	HeaderName, HeaderValue, Method, Request,
	header::{CONTENT_TYPE, HeaderMap},
};
// self
use crate::{_prelude::*, auth::AuthStrategy, error::ConfigError, http::HttpRequest};

/// Body attached to an [`ApiRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// JSON document (`application/json`).
	Json(Value),
	/// Form fields (`application/x-www-form-urlencoded`), in insertion order.
	Form(Vec<(String, String)>),
	/// Pre-encoded bytes with an optional content type.
	Raw {
		/// Content type to declare, when any.
		content_type: Option<String>,
		/// Encoded payload.
		bytes: Vec<u8>,
	},
}
impl RequestBody {
	fn encode(&self) -> Result<(Option<String>, Vec<u8>), ConfigError> {
		Ok(match self {
			Self::Json(value) => (
				Some("application/json".into()),
				serde_json::to_vec(value).map_err(ConfigError::BodyEncoding)?,
			),
			Self::Form(fields) => {
				let mut form = url::form_urlencoded::Serializer::new(String::new());

				form.extend_pairs(fields);

				(Some("application/x-www-form-urlencoded".into()), form.finish().into_bytes())
			},
			Self::Raw { content_type, bytes } => (content_type.clone(), bytes.clone()),
		})
	}
}

/// One logical vendor operation: method, target, headers, query, and body.
///
/// `target` is either an absolute URL or a path joined onto the executor's base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL or base-relative path.
	pub target: String,
	/// Caller-supplied headers, in insertion order.
	pub headers: Vec<(String, String)>,
	/// Query parameters, percent-encoded and appended in insertion order.
	pub query: Vec<(String, String)>,
	/// Optional body.
	pub body: Option<RequestBody>,
}
impl ApiRequest {
	/// Creates a request for `method` and `target`.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), headers: Vec::new(), query: Vec::new(), body: None }
	}

	/// `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// `PUT` request.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a JSON body.
	pub fn json(mut self, body: Value) -> Self {
		self.body = Some(RequestBody::Json(body));

		self
	}

	/// Sets a form body.
	pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.body = Some(RequestBody::Form(
			fields.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
		));

		self
	}

	/// Sets a pre-encoded body.
	pub fn raw(mut self, content_type: Option<String>, bytes: Vec<u8>) -> Self {
		self.body = Some(RequestBody::Raw { content_type, bytes });

		self
	}

	/// Resolves the final URL: joins relative targets onto `base_url` and appends the query.
	pub fn resolve_url(&self, base_url: Option<&Url>) -> Result<Url, ConfigError> {
		let mut url = match Url::parse(&self.target) {
			Ok(url) => url,
			Err(url::ParseError::RelativeUrlWithoutBase) => {
				let base = base_url
					.ok_or_else(|| ConfigError::MissingBaseUrl { path: self.target.clone() })?;
				let joined = format!(
					"{}/{}",
					base.as_str().trim_end_matches('/'),
					self.target.trim_start_matches('/')
				);

				Url::parse(&joined).map_err(|source| ConfigError::invalid_url(joined, source))?
			},
			Err(source) => return Err(ConfigError::invalid_url(self.target.as_str(), source)),
		};

		if !self.query.is_empty() {
			let encoded = self
				.query
				.iter()
				.map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
				.collect::<Vec<_>>()
				.join("&");
			let query = match url.query() {
				Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
				_ => encoded,
			};

			url.set_query(Some(&query));
		}

		Ok(url)
	}

	/// Builds the wire request for one attempt, asking `auth` for fresh headers.
	pub fn build(&self, url: &Url, auth: &dyn AuthStrategy) -> Result<HttpRequest, ConfigError> {
		let mut headers = HeaderMap::new();

		for (name, value) in &self.headers {
			let invalid = || ConfigError::InvalidHeader { name: name.clone() };

			headers.append(
				HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?,
				HeaderValue::from_str(value).map_err(|_| invalid())?,
			);
		}

		let body = match &self.body {
			Some(body) => {
				let (content_type, bytes) = body.encode()?;

				if let Some(content_type) = content_type
					&& !headers.contains_key(CONTENT_TYPE)
				{
					headers.insert(
						CONTENT_TYPE,
						HeaderValue::from_str(&content_type)
							.map_err(|_| ConfigError::InvalidHeader { name: CONTENT_TYPE.to_string() })?,
					);
				}

				bytes
			},
			None => Vec::new(),
		};

		auth.add_auth_headers(&mut headers)?;

		let mut request =
			Request::builder().method(self.method.clone()).uri(url.as_str()).body(body)?;

		*request.headers_mut() = headers;

		Ok(request)
	}
}

/// Percent-encodes one query component; spaces become `%20`.
fn encode_component(raw: &str) -> String {
	url::form_urlencoded::byte_serialize(raw.as_bytes()).collect::<String>().replace('+', "%20")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ApiKeyConfig, ApiKeyStrategy};

	fn base() -> Url {
		Url::parse("https://api.example.com/v2/").expect("Base URL should parse.")
	}

	#[test]
	fn query_is_encoded_in_insertion_order() {
		let url = ApiRequest::get("/contacts")
			.query("z", "last one")
			.query("a", "x&y=1")
			.resolve_url(Some(&base()))
			.expect("URL should resolve.");

		assert_eq!(url.as_str(), "https://api.example.com/v2/contacts?z=last%20one&a=x%26y%3D1");
	}

	#[test]
	fn absolute_targets_ignore_base_and_keep_existing_query() {
		let url = ApiRequest::get("https://other.example.com/items?page=2")
			.query("limit", "10")
			.resolve_url(Some(&base()))
			.expect("URL should resolve.");

		assert_eq!(url.as_str(), "https://other.example.com/items?page=2&limit=10");
	}

	#[test]
	fn relative_target_without_base_fails() {
		assert!(matches!(
			ApiRequest::get("/contacts").resolve_url(None),
			Err(ConfigError::MissingBaseUrl { .. })
		));
	}

	#[test]
	fn build_sets_content_type_and_auth() {
		let auth = ApiKeyStrategy::new(ApiKeyConfig::default())
			.expect("API key strategy should build.")
			.with_key("secret");
		let request =
			ApiRequest::post("/contacts").header("x-trace", "1").json(serde_json::json!({ "a": 1 }));
		let url = request.resolve_url(Some(&base())).expect("URL should resolve.");
		let wire = request.build(&url, &auth).expect("Request should build.");

		assert_eq!(*wire.method(), Method::POST);
		assert_eq!(wire.headers()[CONTENT_TYPE], "application/json");
		assert_eq!(wire.headers()["x-api-key"], "secret");
		assert_eq!(wire.headers()["x-trace"], "1");
		assert_eq!(wire.body().as_slice(), br#"{"a":1}"#);
	}

	#[test]
	fn form_body_is_url_encoded() {
		let auth =
			ApiKeyStrategy::new(ApiKeyConfig::default()).expect("API key strategy should build.");
		let request =
			ApiRequest::put("https://api.example.com/x").form([("name", "a b"), ("k", "v")]);
		let url = request.resolve_url(None).expect("URL should resolve.");
		let wire = request.build(&url, &auth).expect("Request should build.");

		assert_eq!(wire.body().as_slice(), b"name=a+b&k=v");
		assert_eq!(wire.headers()[CONTENT_TYPE], "application/x-www-form-urlencoded");
		assert!(!wire.headers().contains_key("x-api-key"));
	}
}
