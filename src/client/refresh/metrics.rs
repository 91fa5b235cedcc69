// std
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug)]
pub(crate) enum Counter {
	Attempt,
	Success,
	Failure,
	Coalesced,
	NetworkCall,
}

/// Running totals for one coordinator, readable while refreshes are in flight.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	counters: [AtomicU64; 5],
}
impl RefreshMetrics {
	/// Cycles started; one per leader.
	pub fn attempts(&self) -> u64 {
		self.read(Counter::Attempt)
	}

	/// Cycles that handed out an access token, whether freshly issued or already rotated in.
	pub fn successes(&self) -> u64 {
		self.read(Counter::Success)
	}

	/// Cycles that ended the session.
	pub fn failures(&self) -> u64 {
		self.read(Counter::Failure)
	}

	/// Callers that waited on another caller's cycle.
	pub fn coalesced(&self) -> u64 {
		self.read(Counter::Coalesced)
	}

	/// Requests that reached the refresh endpoint.
	pub fn network_calls(&self) -> u64 {
		self.read(Counter::NetworkCall)
	}

	pub(crate) fn bump(&self, counter: Counter) {
		self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
	}

	fn read(&self, counter: Counter) -> u64 {
		self.counters[counter as usize].load(Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn counters_are_independent() {
		let metrics = RefreshMetrics::default();

		metrics.bump(Counter::Attempt);
		metrics.bump(Counter::Coalesced);
		metrics.bump(Counter::Coalesced);

		assert_eq!(metrics.attempts(), 1);
		assert_eq!(metrics.coalesced(), 2);
		assert_eq!(metrics.successes(), 0);
		assert_eq!(metrics.network_calls(), 0);
	}
}
