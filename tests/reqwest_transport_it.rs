#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use connector_broker::{
	auth::{ApiKeyConfig, ApiKeyStrategy},
	error::RequestErrorKind,
	http::ReqwestTransport,
	notify::{self, Notification, NotificationReceiver},
	request::{ApiRequest, BackoffPolicy, RequestExecutor, ResponseBody},
};

fn executor(base_url: &str) -> (RequestExecutor, NotificationReceiver) {
	let (tx, rx) = notify::channel();
	let auth = ApiKeyStrategy::new(ApiKeyConfig::default().with_prefix("Key "))
		.expect("API key config should be valid.")
		.with_key("live-key");
	let executor = RequestExecutor::new(Arc::new(ReqwestTransport::default()), Arc::new(auth))
		.with_base_url(Url::parse(base_url).expect("Mock server URL should parse."))
		.with_backoff(BackoffPolicy::none())
		.with_notifications(tx);

	(executor, rx)
}

#[tokio::test]
async fn reqwest_transport_sends_auth_query_and_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/contacts")
				.query_param("tag", "a b")
				.header("x-api-key", "Key live-key")
				.header("content-type", "application/json")
				.json_body(json!({ "name": "Ada" }));
			then.status(201)
				.header("content-type", "application/json")
				.body("{\"id\":\"c-1\"}");
		})
		.await;
	let (executor, mut rx) = executor(&server.url("/api"));
	let body = executor
		.request(&ApiRequest::post("/contacts").query("tag", "a b").json(json!({ "name": "Ada" })))
		.await
		.expect("Create request should succeed.");

	mock.assert_async().await;

	assert_eq!(body, ResponseBody::Json(json!({ "id": "c-1" })));
	assert!(rx.drain().is_empty());
}

#[tokio::test]
async fn reqwest_transport_reports_unauthorized() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/me");
			then.status(401).body("denied");
		})
		.await;
	let (executor, mut rx) = executor(&server.url("/api"));
	let err = executor
		.request(&ApiRequest::get("/me"))
		.await
		.expect_err("A 401 should fail the chain.");

	mock.assert_async().await;

	assert_eq!(err.request_kind(), Some(RequestErrorKind::AuthFailure));
	assert_eq!(rx.drain(), vec![Notification::InvalidAuth]);
}

#[tokio::test]
async fn refused_connections_are_transport_errors() {
	let (executor, _rx) = executor("http://127.0.0.1:9/api");
	let err = executor
		.request(&ApiRequest::get("/me"))
		.await
		.expect_err("Nothing listens on the discard port.");

	assert_eq!(err.request_kind(), Some(RequestErrorKind::Transport));
}
