// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for relay attempts.
#[derive(Debug, Default)]
pub struct RelayMetrics {
	attempts: AtomicU64,
	relayed: AtomicU64,
	rejected: AtomicU64,
	failed: AtomicU64,
}
impl RelayMetrics {
	/// Returns the total number of relay attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of messages the provider accepted.
	pub fn relayed(&self) -> u64 {
		self.relayed.load(Ordering::Relaxed)
	}

	/// Returns the number of caller-caused refusals (bad input, unknown or expired token,
	/// cooldown).
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Returns the number of upstream or storage failures.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_relayed(&self) {
		self.relayed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}
}
