//! The request executor: auth injection, retry with backoff, and refresh-or-invalidate on 401.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::AuthStrategy,
	error::{RequestError, RequestErrorKind},
	http::HttpTransport,
	notify::{Notification, NotificationSender},
	obs::{self, Operation},
	request::{ApiRequest, ApiResponse, BackoffPolicy, ResponseBody, Sleeper, TokioSleeper},
};

/// Per-executor counters.
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
	attempts: AtomicU64,
	retries: AtomicU64,
	refreshes: AtomicU64,
	invalidations: AtomicU64,
}
impl ExecutorMetrics {
	/// Returns a point-in-time copy of the counters.
	pub fn snapshot(&self) -> ExecutorMetricsSnapshot {
		ExecutorMetricsSnapshot {
			attempts: self.attempts.load(Ordering::Relaxed),
			retries: self.retries.load(Ordering::Relaxed),
			refreshes: self.refreshes.load(Ordering::Relaxed),
			invalidations: self.invalidations.load(Ordering::Relaxed),
		}
	}

	fn bump(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}
}

/// Copy of [`ExecutorMetrics`] at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutorMetricsSnapshot {
	/// Requests put on the wire.
	pub attempts: u64,
	/// Backoff waits taken.
	pub retries: u64,
	/// Refreshes invoked.
	pub refreshes: u64,
	/// `INVALID_AUTH` emissions.
	pub invalidations: u64,
}

/// Sends logical requests for one vendor API object.
///
/// Each chain reads fresh auth headers on every attempt, waits `backoff[attempt]` before
/// retrying connection resets, 429s, and 5xx responses, and answers a 401 with at most one
/// refresh. A 401 that cannot be recovered emits exactly one
/// [`Notification::InvalidAuth`] and fails the chain.
#[derive(Clone)]
pub struct RequestExecutor {
	transport: Arc<dyn HttpTransport>,
	auth: Arc<dyn AuthStrategy>,
	base_url: Option<Url>,
	backoff: BackoffPolicy,
	sleeper: Arc<dyn Sleeper>,
	notifications: NotificationSender,
	metrics: Arc<ExecutorMetrics>,
}
impl RequestExecutor {
	/// Creates an executor with the default backoff, a tokio sleeper, and no notification owner.
	pub fn new(transport: Arc<dyn HttpTransport>, auth: Arc<dyn AuthStrategy>) -> Self {
		Self {
			transport,
			auth,
			base_url: None,
			backoff: BackoffPolicy::default(),
			sleeper: Arc::new(TokioSleeper),
			notifications: NotificationSender::detached(),
			metrics: Default::default(),
		}
	}

	/// Sets the base URL relative targets are joined onto.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Overrides the backoff policy.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;

		self
	}

	/// Overrides the sleeper used for backoff waits.
	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Routes lifecycle events to `notifications`.
	pub fn with_notifications(mut self, notifications: NotificationSender) -> Self {
		self.notifications = notifications;

		self
	}

	/// Auth strategy shared by every chain.
	pub fn auth(&self) -> &Arc<dyn AuthStrategy> {
		&self.auth
	}

	/// Base URL, when configured.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Counters for this executor.
	pub fn metrics(&self) -> ExecutorMetricsSnapshot {
		self.metrics.snapshot()
	}

	/// Runs a chain and parses the successful body (JSON or text).
	pub async fn request(&self, request: &ApiRequest) -> Result<ResponseBody> {
		self.request_full(request).await?.parse_body()
	}

	/// Runs a chain and returns the unparsed successful response.
	pub async fn request_full(&self, request: &ApiRequest) -> Result<ApiResponse> {
		obs::observe(Operation::Request, "executor.request", self.run_chain(request)).await
	}

	async fn run_chain(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let url = request.resolve_url(self.base_url.as_ref())?;
		let fail = |kind| RequestError::new(kind, request.method.as_str(), url.as_str());
		let mut attempt = 0_usize;
		let mut refreshes = 0_u8;

		loop {
			let epoch = self.auth.epoch();
			let wire = request.build(&url, self.auth.as_ref())?;

			ExecutorMetrics::bump(&self.metrics.attempts);

			let response = match self.transport.send(wire).await {
				Ok(response) => response,
				Err(e) => {
					if e.is_retryable()
						&& let Some(delay) = self.backoff.delay_for(attempt)
					{
						tracing::warn!(attempt, ?delay, error = %e, "Transport failure; retrying.");

						self.wait(delay).await;
						attempt += 1;

						continue;
					}

					return Err(fail(RequestErrorKind::Transport).with_source(e).into());
				},
			};
			let status = response.status().as_u16();

			if is_retryable_status(status) {
				if let Some(delay) = self.backoff.delay_for(attempt) {
					tracing::warn!(attempt, status, ?delay, "Retryable response; retrying.");

					self.wait(delay).await;
					attempt += 1;

					continue;
				}
			} else if status == 401 {
				if !self.auth.is_refreshable() || refreshes > 0 {
					self.invalidate();

					return Err(fail(RequestErrorKind::AuthFailure)
						.with_response(status, response.body())
						.into());
				}

				refreshes += 1;
				ExecutorMetrics::bump(&self.metrics.refreshes);
				tracing::info!(attempt, "Unauthorized; refreshing credentials.");

				if let Err(e) = self.auth.refresh(epoch).await {
					tracing::warn!(error = %e, "Credential refresh failed.");

					self.invalidate();

					return Err(fail(RequestErrorKind::AuthFailure)
						.with_response(status, response.body())
						.with_source(e)
						.into());
				}

				attempt += 1;

				continue;
			}

			if status >= 400 {
				let kind = if is_retryable_status(status) {
					RequestErrorKind::RetryableHttp
				} else {
					RequestErrorKind::FatalHttp
				};

				return Err(fail(kind).with_response(status, response.body()).into());
			}

			return Ok(response.into());
		}
	}

	async fn wait(&self, delay: StdDuration) {
		ExecutorMetrics::bump(&self.metrics.retries);

		self.sleeper.sleep(delay).await;
	}

	fn invalidate(&self) {
		ExecutorMetrics::bump(&self.metrics.invalidations);
		tracing::warn!(auth = self.auth.kind().as_str(), "Credentials rejected by the remote API.");

		self.notifications.emit(Notification::InvalidAuth);
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("auth", &self.auth.kind())
			.field("base_url", &self.base_url)
			.field("backoff", &self.backoff)
			.finish()
	}
}

fn is_retryable_status(status: u16) -> bool {
	status == 429 || status >= 500
}
