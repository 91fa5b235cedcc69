//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_client.op` with the `op` and
//!   `stage` (call site) fields, plus debug events for refresh queue activity.
//! - Enable `metrics` to increment the `session_client_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// An API call through the request pipeline, including any replay.
	Request,
	/// A refresh cycle run by the coordinator.
	Refresh,
	/// A forced or explicit sign-out.
	Terminate,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Request => "request",
			OpKind::Refresh => "refresh",
			OpKind::Terminate => "terminate",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// The caller joined an in-flight refresh instead of starting one.
	Coalesced,
	/// Nothing to do (already signed out).
	Skipped,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Coalesced => "coalesced",
			OpOutcome::Skipped => "skipped",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
