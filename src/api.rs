//! The vendor API object every module definition talks through.

// self
use crate::{
	_prelude::*,
	auth::AuthStrategy,
	request::{ApiRequest, ApiResponse, RequestExecutor, ResponseBody},
};

/// Vendor API handle: a [`RequestExecutor`] plus request helpers.
///
/// Vendor-specific clients hold (or wrap) an `ApiClient` rather than re-implementing
/// transport, retry, or auth handling.
#[derive(Clone, Debug)]
pub struct ApiClient {
	executor: RequestExecutor,
}
impl ApiClient {
	/// Wraps an executor.
	pub fn new(executor: RequestExecutor) -> Self {
		Self { executor }
	}

	/// Underlying executor.
	pub fn executor(&self) -> &RequestExecutor {
		&self.executor
	}

	/// Auth strategy shared by every request.
	pub fn auth(&self) -> &Arc<dyn AuthStrategy> {
		self.executor.auth()
	}

	/// Sends a prepared request and parses the body.
	pub async fn send(&self, request: ApiRequest) -> Result<ResponseBody> {
		self.executor.request(&request).await
	}

	/// Sends a prepared request and returns the unparsed response.
	pub async fn send_full(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.executor.request_full(&request).await
	}

	/// `GET` with query parameters.
	pub async fn get<K, V>(
		&self,
		target: &str,
		query: impl IntoIterator<Item = (K, V)>,
	) -> Result<ResponseBody>
	where
		K: Into<String>,
		V: Into<String>,
	{
		let request = query
			.into_iter()
			.fold(ApiRequest::get(target), |request, (key, value)| request.query(key, value));

		self.send(request).await
	}

	/// `POST` with a JSON body.
	pub async fn post(&self, target: &str, body: Value) -> Result<ResponseBody> {
		self.send(ApiRequest::post(target).json(body)).await
	}

	/// `PUT` with a JSON body.
	pub async fn put(&self, target: &str, body: Value) -> Result<ResponseBody> {
		self.send(ApiRequest::put(target).json(body)).await
	}

	/// `PATCH` with a JSON body.
	pub async fn patch(&self, target: &str, body: Value) -> Result<ResponseBody> {
		self.send(ApiRequest::patch(target).json(body)).await
	}

	/// `DELETE`; returns the full response since deletes rarely carry a body.
	pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
		self.send_full(ApiRequest::delete(target)).await
	}
}
