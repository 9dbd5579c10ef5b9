//! Observability helpers for issue and relay flows.
//!
//! # Spans and events
//!
//! Every flow runs inside a `link_cloak.flow` span with `flow` and `stage` fields. Tokens are
//! only ever logged by fingerprint. Caller-caused outcomes (`class = "client"`) are logged at
//! `info`; service failures (`class = "system"`) at `warn`.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `link_cloak_flow_total` counter for every
//!   attempt/success/rejection/failure, labeled by `flow` + `outcome`.
//! - Enable `server` to get [`init_tracing`], which installs a `tracing-subscriber` formatter
//!   driven by `RUST_LOG`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::{_prelude::*, error::ErrorClass};

/// Flow kinds observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Token issuance.
	Issue,
	/// Message relay.
	Relay,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Issue => "issue",
			FlowKind::Relay => "relay",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// The caller's request was refused (bad input, unknown/expired token, cooldown).
	Rejected,
	/// The service or one of its collaborators failed.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Rejected => "rejected",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Classifies a finished flow.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => FlowOutcome::Success,
			Err(e) => match e.class() {
				ErrorClass::Client => FlowOutcome::Rejected,
				ErrorClass::System => FlowOutcome::Failure,
			},
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logs and records the final outcome of a flow.
pub fn finish_flow<T>(kind: FlowKind, result: &Result<T>) {
	let outcome = FlowOutcome::of(result);

	if let Err(e) = result {
		match e.class() {
			ErrorClass::Client => ::tracing::info!(
				flow = kind.as_str(),
				class = ErrorClass::Client.as_str(),
				error = e.label(),
				"{e}"
			),
			ErrorClass::System => ::tracing::warn!(
				flow = kind.as_str(),
				class = ErrorClass::System.as_str(),
				error = e.label(),
				"{e}"
			),
		}
	}

	record_flow_outcome(kind, outcome);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_separates_client_and_system_errors() {
		let rejected: Result<()> = Err(Error::RateLimited { remaining_seconds: 10 });
		let failed: Result<()> = Err(Error::StoreConflict);
		let ok: Result<()> = Ok(());

		assert_eq!(FlowOutcome::of(&rejected), FlowOutcome::Rejected);
		assert_eq!(FlowOutcome::of(&failed), FlowOutcome::Failure);
		assert_eq!(FlowOutcome::of(&ok), FlowOutcome::Success);

		finish_flow(FlowKind::Relay, &rejected);
		finish_flow(FlowKind::Issue, &failed);
	}
}
