//! Observability helpers for executor chains and lifecycle operations.
//!
//! Every chain or orchestrator operation runs inside a span named
//! `connector_broker.operation` with `operation` and `stage` fields. With the `metrics`
//! feature enabled, the `connector_broker_operation_total` counter is incremented for
//! every attempt/success/failure, labeled by `operation` + `outcome`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// One logical vendor request chain.
	Request,
	/// Access-token refresh.
	Refresh,
	/// Authorization-code exchange or static credential application.
	Authorize,
	/// Authorization callback processed by the orchestrator.
	AuthorizationCallback,
	/// Credential persistence after new tokens arrived.
	TokenUpdate,
	/// Credential invalidation after an unrecovered 401.
	MarkInvalid,
	/// Credential removal.
	Deauthorize,
	/// Vendor authentication probe.
	TestAuth,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Request => "request",
			Operation::Refresh => "refresh",
			Operation::Authorize => "authorize",
			Operation::AuthorizationCallback => "authorization_callback",
			Operation::TokenUpdate => "token_update",
			Operation::MarkInvalid => "mark_invalid",
			Operation::Deauthorize => "deauthorize",
			Operation::TestAuth => "test_auth",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt plus success/failure.
pub(crate) async fn observe<T, E, F>(operation: Operation, stage: &'static str, fut: F) -> Result<T, E>
where
	F: Future<Output = Result<T, E>>,
{
	record_operation_outcome(operation, OperationOutcome::Attempt);

	let result = OperationSpan::new(operation, stage).instrument(fut).await;
	let outcome =
		if result.is_ok() { OperationOutcome::Success } else { OperationOutcome::Failure };

	record_operation_outcome(operation, outcome);

	result
}
