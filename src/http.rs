//! Transport primitives shared by the request executor and the OAuth 2.0 token client.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. The executor
//! sends vendor requests through it, and the token client reaches the same transport
//! through [`TransportHandle`], an [`AsyncHttpClient`] adapter handed to `oauth2`.

// crates.io
use oauth2::AsyncHttpClient;
pub use oauth2::{HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to send one fully built request.
///
/// Implementations return every HTTP response (including 4xx/5xx) as `Ok`; only failures
/// that produced no response surface as [`TransportError`], classified so the executor
/// can tell a retryable connection reset from a timeout or a local fault.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves with the raw response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// [`AsyncHttpClient`] adapter that routes `oauth2` token requests through an [`HttpTransport`]
/// and remembers the last response status for error mapping.
#[derive(Clone)]
pub(crate) struct TransportHandle {
	transport: Arc<dyn HttpTransport>,
	last_status: Arc<Mutex<Option<u16>>>,
}
impl TransportHandle {
	pub(crate) fn new(transport: Arc<dyn HttpTransport>) -> Self {
		Self { transport, last_status: Default::default() }
	}

	/// Returns and clears the status captured by the last call.
	pub(crate) fn take_status(&self) -> Option<u16> {
		self.last_status.lock().take()
	}
}
impl<'c> AsyncHttpClient<'c> for TransportHandle {
	type Error = TransportError;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.last_status.lock().take();

			let response = self.transport.send(request).await?;

			*self.last_status.lock() = Some(response.status().as_u16());

			Ok(response)
		})
	}
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	timeout: Option<StdDuration>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, timeout: None }
	}

	/// Bounds every call with a per-request timeout; a timed-out call is not retried.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut request = reqwest::Request::try_from(request).map_err(map_reqwest_error)?;

			if let Some(timeout) = self.timeout {
				*request.timeout_mut() = Some(timeout);
			}

			let response = self.client.execute(request).await.map_err(map_reqwest_error)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(map_reqwest_error)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		return TransportError::timeout(err);
	}
	if err.is_connect() || has_connection_reset(&err) {
		return TransportError::connection(err);
	}

	TransportError::other(err)
}

#[cfg(feature = "reqwest")]
fn has_connection_reset(err: &(dyn StdError + 'static)) -> bool {
	let mut cursor = err.source();

	while let Some(inner) = cursor {
		if let Some(io) = inner.downcast_ref::<std::io::Error>()
			&& TransportError::from(std::io::Error::from(io.kind())).is_retryable()
		{
			return true;
		}

		cursor = inner.source();
	}

	false
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct FixedStatus(u16);
	impl HttpTransport for FixedStatus {
		fn send(&self, _request: HttpRequest) -> TransportFuture<'_> {
			let status = self.0;

			Box::pin(async move {
				let mut response = HttpResponse::new(Vec::new());

				*response.status_mut() = oauth2::http::StatusCode::from_u16(status)
					.expect("Fixture status should be valid.");

				Ok(response)
			})
		}
	}

	#[tokio::test]
	async fn handle_captures_last_status() {
		let handle = TransportHandle::new(Arc::new(FixedStatus(400)));
		let request = HttpRequest::new(Vec::new());
		let response = handle.call(request).await.expect("Scripted transport should respond.");

		assert_eq!(response.status().as_u16(), 400);
		assert_eq!(handle.take_status(), Some(400));
		assert_eq!(handle.take_status(), None);
	}
}
