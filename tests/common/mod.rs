#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	io::{Error as IoError, ErrorKind},
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use serde_json::{Value, json};
use url::Url;
// self
use connector_broker::{
	api::ApiClient,
	auth::{AuthConfig, AuthorizationData, BasicAuthConfig, OAuth2Config},
	error::{Result, TransportError},
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	module::{DefinitionFuture, ModuleContext, ModuleDefinition, ModuleRegistry},
	oauth::oauth2::http::{HeaderMap, Response},
	record::{EntityDetails, RecordDetails, UserId},
	request::{ApiRequest, SleepFuture, Sleeper},
	store::MemoryStore,
};

pub const BASIC_MODULE: &str = "demo-basic";
pub const OAUTH_MODULE: &str = "demo-oauth";

/// What the transport saw for one request.
#[derive(Clone, Debug)]
pub struct SeenRequest {
	pub method: String,
	pub url: String,
	pub path: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
}
impl SeenRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Transport replaying queued outcomes and recording every request it saw.
#[derive(Default)]
pub struct ScriptedTransport {
	script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
	fallback: Mutex<Option<(u16, Value)>>,
	requests: Mutex<Vec<SeenRequest>>,
	yield_before_reply: AtomicBool,
}
impl ScriptedTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Makes every reply yield to the runtime once, so concurrent chains interleave.
	pub fn yield_before_reply(&self) -> &Self {
		self.yield_before_reply.store(true, Ordering::Relaxed);

		self
	}

	pub fn push(&self, response: HttpResponse) -> &Self {
		self.script.lock().expect("Script lock should not be poisoned.").push_back(Ok(response));

		self
	}

	pub fn push_json(&self, status: u16, body: Value) -> &Self {
		self.push(json_response(status, body))
	}

	pub fn push_status(&self, status: u16) -> &Self {
		self.push_json(status, json!({ "error": status }))
	}

	pub fn push_reset(&self) -> &Self {
		self.script
			.lock()
			.expect("Script lock should not be poisoned.")
			.push_back(Err(TransportError::from(IoError::from(ErrorKind::ConnectionReset))));

		self
	}

	/// Served once the script is exhausted.
	pub fn set_fallback(&self, status: u16, body: Value) {
		*self.fallback.lock().expect("Fallback lock should not be poisoned.") = Some((status, body));
	}

	pub fn requests(&self) -> Vec<SeenRequest> {
		self.requests.lock().expect("Request log lock should not be poisoned.").clone()
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().expect("Request log lock should not be poisoned.").len()
	}

	pub fn paths(&self) -> Vec<String> {
		self.requests().into_iter().map(|request| request.path).collect()
	}

	pub fn authorization_headers(&self) -> Vec<Option<String>> {
		self.requests()
			.iter()
			.map(|request| request.header("authorization").map(str::to_owned))
			.collect()
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let seen = SeenRequest {
			method: request.method().to_string(),
			url: request.uri().to_string(),
			path: request.uri().path().to_owned(),
			headers: request.headers().clone(),
			body: request.body().clone(),
		};

		self.requests.lock().expect("Request log lock should not be poisoned.").push(seen);

		let next = self.script.lock().expect("Script lock should not be poisoned.").pop_front();
		let outcome = match next {
			Some(outcome) => outcome,
			None => {
				let fallback = self.fallback.lock().expect("Fallback lock should not be poisoned.");
				let (status, body) =
					fallback.clone().expect("Scripted transport ran out of responses.");

				Ok(json_response(status, body))
			},
		};

		let yield_first = self.yield_before_reply.load(Ordering::Relaxed);

		Box::pin(async move {
			if yield_first {
				tokio::task::yield_now().await;
			}

			outcome
		})
	}
}

/// Sleeper that returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<StdDuration>>);
impl RecordingSleeper {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn delays(&self) -> Vec<StdDuration> {
		self.0.lock().expect("Sleeper lock should not be poisoned.").clone()
	}
}
impl Sleeper for RecordingSleeper {
	fn sleep(&self, duration: StdDuration) -> SleepFuture<'_> {
		self.0.lock().expect("Sleeper lock should not be poisoned.").push(duration);

		Box::pin(async {})
	}
}

/// Vendor whose `/me` endpoint identifies the connected account.
pub struct DemoDefinition {
	name: &'static str,
	auth: AuthConfig,
	base_url: Url,
}
impl DemoDefinition {
	pub fn basic() -> Self {
		Self {
			name: BASIC_MODULE,
			auth: AuthConfig::Basic(BasicAuthConfig::with_fields("clientKey", "secret")),
			base_url: url("https://api.demo.test/v1"),
		}
	}

	pub fn oauth2() -> Self {
		let config = OAuth2Config::new(
			"client-1",
			url("https://auth.demo.test/authorize"),
			url("https://auth.demo.test/token"),
		)
		.with_client_secret("client-secret")
		.with_redirect_uri(url("https://app.demo.test/callback"))
		.with_revocation_uri(url("https://auth.demo.test/revoke"))
		.with_scope("read write");

		Self { name: OAUTH_MODULE, auth: AuthConfig::OAuth2(config), base_url: url("https://api.demo.test") }
	}
}
impl ModuleDefinition for DemoDefinition {
	fn module_name(&self) -> &str {
		self.name
	}

	fn auth_config(&self) -> &AuthConfig {
		&self.auth
	}

	fn base_url(&self) -> Option<&Url> {
		Some(&self.base_url)
	}

	fn test_auth<'a>(&'a self, api: &'a ApiClient) -> DefinitionFuture<'a, bool> {
		Box::pin(async move {
			api.send(ApiRequest::get("/me")).await?;

			Ok(true)
		})
	}

	fn entity_details<'a>(
		&'a self,
		api: &'a ApiClient,
		_: &'a AuthorizationData,
		_: &'a UserId,
	) -> DefinitionFuture<'a, EntityDetails> {
		Box::pin(async move {
			let me = api.send(ApiRequest::get("/me")).await?.into_json();
			let mut details = EntityDetails::new(me["id"].as_str().unwrap_or_default());

			if let Some(name) = me["name"].as_str() {
				details = details.with_name(name);
			}

			Ok(details)
		})
	}

	fn credential_details<'a>(
		&'a self,
		api: &'a ApiClient,
		_: &'a UserId,
	) -> DefinitionFuture<'a, RecordDetails> {
		Box::pin(async move {
			let me = api.send(ApiRequest::get("/me")).await?.into_json();

			Ok(RecordDetails::new()
				.identifier("external_id", me["id"].as_str().unwrap_or_default())
				.detail("account_name", me["name"].clone()))
		})
	}
}

pub struct Harness {
	pub ctx: ModuleContext,
	pub store: MemoryStore,
	pub transport: Arc<ScriptedTransport>,
	pub sleeper: Arc<RecordingSleeper>,
}

pub fn harness() -> Harness {
	let store = MemoryStore::default();
	let transport = ScriptedTransport::new();
	let sleeper = RecordingSleeper::new();
	let registry = ModuleRegistry::new()
		.with_definition(DemoDefinition::basic())
		.with_definition(DemoDefinition::oauth2());
	let ctx = ModuleContext::with_transport(
		registry,
		Arc::new(store.clone()),
		Arc::new(store.clone()),
		transport.clone(),
	)
	.with_sleeper(sleeper.clone());

	Harness { ctx, store, transport, sleeper }
}

pub fn user(id: &str) -> UserId {
	UserId::new(id).expect("User fixture should be valid.")
}

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("URL fixture should parse.")
}

pub fn me(id: &str, name: &str) -> Value {
	json!({ "id": id, "name": name })
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
	Response::builder()
		.status(status)
		.header("content-type", "application/json")
		.body(serde_json::to_vec(&body).expect("JSON fixture should serialize."))
		.expect("Response fixture should build.")
}

pub fn token_response(access: &str, refresh: Option<&str>) -> HttpResponse {
	let mut body = json!({ "access_token": access, "token_type": "bearer", "expires_in": 3600 });

	if let Some(refresh) = refresh {
		body["refresh_token"] = Value::from(refresh);
	}

	json_response(200, body)
}

pub fn data(pairs: &[(&str, &str)]) -> AuthorizationData {
	pairs.iter().map(|(key, value)| ((*key).to_owned(), Value::from(*value))).collect()
}
