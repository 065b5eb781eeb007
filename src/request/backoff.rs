//! Retry pacing: the backoff policy and the sleeper that waits it out.

// self
use crate::_prelude::*;

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Ordered wait durations; attempt `i` that needs a retry waits `policy[i]` before attempt `i + 1`.
///
/// Serialized as a list of seconds (fractions allowed).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BackoffPolicy(Vec<StdDuration>);
impl BackoffPolicy {
	/// Default schedule in seconds.
	pub const DEFAULT_SECS: [u64; 6] = [1, 3, 10, 30, 60, 180];

	/// Creates a policy from explicit durations.
	pub fn new(delays: impl IntoIterator<Item = StdDuration>) -> Self {
		Self(delays.into_iter().collect())
	}

	/// Creates a policy from whole seconds.
	pub fn from_secs(delays: impl IntoIterator<Item = u64>) -> Self {
		Self::new(delays.into_iter().map(StdDuration::from_secs))
	}

	/// A policy that never retries.
	pub fn none() -> Self {
		Self(Vec::new())
	}

	/// Returns the wait before retrying after attempt `attempt`, or `None` once the budget is spent.
	pub fn delay_for(&self, attempt: usize) -> Option<StdDuration> {
		self.0.get(attempt).copied()
	}

	/// Number of retries the policy allows.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the policy allows no retry.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates the configured delays in order.
	pub fn iter(&self) -> impl Iterator<Item = StdDuration> + '_ {
		self.0.iter().copied()
	}
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::from_secs(Self::DEFAULT_SECS)
	}
}
impl TryFrom<Vec<f64>> for BackoffPolicy {
	type Error = String;

	fn try_from(secs: Vec<f64>) -> Result<Self, Self::Error> {
		secs.into_iter()
			.map(|value| {
				StdDuration::try_from_secs_f64(value)
					.map_err(|_| format!("backoff delay {value} must be a finite, non-negative number"))
			})
			.collect::<Result<Vec<_>, _>>()
			.map(Self)
	}
}
impl From<BackoffPolicy> for Vec<f64> {
	fn from(policy: BackoffPolicy) -> Self {
		policy.0.iter().map(StdDuration::as_secs_f64).collect()
	}
}

/// Suspends the current chain for a backoff delay.
pub trait Sleeper
where
	Self: 'static + Send + Sync,
{
	/// Waits for `duration`.
	fn sleep(&self, duration: StdDuration) -> SleepFuture<'_>;
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
impl Sleeper for TokioSleeper {
	fn sleep(&self, duration: StdDuration) -> SleepFuture<'_> {
		Box::pin(tokio::time::sleep(duration))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_policy_matches_documented_schedule() {
		let policy = BackoffPolicy::default();

		assert_eq!(policy.len(), 6);
		assert_eq!(policy.delay_for(0), Some(StdDuration::from_secs(1)));
		assert_eq!(policy.delay_for(5), Some(StdDuration::from_secs(180)));
		assert_eq!(policy.delay_for(6), None);
		assert!(BackoffPolicy::none().delay_for(0).is_none());
	}

	#[test]
	fn deserializes_from_seconds() {
		let policy: BackoffPolicy =
			serde_json::from_str("[0.5, 2]").expect("Backoff list should deserialize.");

		assert_eq!(
			policy.iter().collect::<Vec<_>>(),
			vec![StdDuration::from_millis(500), StdDuration::from_secs(2)]
		);
		assert!(serde_json::from_str::<BackoffPolicy>("[-1]").is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn tokio_sleeper_waits() {
		let started = tokio::time::Instant::now();

		TokioSleeper.sleep(StdDuration::from_secs(3)).await;

		assert!(started.elapsed() >= StdDuration::from_secs(3));
	}
}
