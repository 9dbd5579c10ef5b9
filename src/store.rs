//! Storage contracts and built-in store implementations for link records and the usage counter.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	link::{LinkRecord, LinkToken},
};

/// Boxed future returned by every [`LinkStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Receiver that observes every usage-counter change.
pub type CounterWatch = watch::Receiver<u64>;

/// Storage backend contract implemented by link stores.
///
/// Implementations must give strongly consistent single-key reads after a write from the same
/// process. Callers never cache records across operations, so all per-key coordination lives
/// here.
pub trait LinkStore
where
	Self: Send + Sync,
{
	/// Persists a new record, failing with [`StoreError::Conflict`] if the token already exists.
	fn create(&self, record: LinkRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record keyed by `token`, if present.
	fn fetch<'a>(&'a self, token: &'a LinkToken) -> StoreFuture<'a, Option<LinkRecord>>;

	/// Records a successful relay at `instant` without rewriting the rest of the record.
	///
	/// Fails with [`StoreError::NotFound`] when no record exists. The stored value never moves
	/// backwards: an older `instant` leaves a newer value in place.
	fn update_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()>;

	/// Atomically replaces `last_sent_at` if it still equals `expected`.
	fn compare_and_swap_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		expected: Option<OffsetDateTime>,
		replacement: Option<OffsetDateTime>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Atomically adds one to the usage counter, creating it at 1 when missing.
	fn increment_counter(&self) -> StoreFuture<'_, u64>;

	/// Creates the usage counter at 0 when missing and returns its current value.
	fn ensure_counter(&self) -> StoreFuture<'_, u64>;

	/// Reads the usage counter without creating it.
	fn counter(&self) -> StoreFuture<'_, Option<u64>>;

	/// Subscribes to counter changes when the backend supports push notifications.
	fn subscribe_counter(&self) -> Option<CounterWatch> {
		None
	}
}

/// Result of a `last_sent_at` compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored value matched `expected` and was replaced.
	Updated,
	/// The record exists but its `last_sent_at` changed since it was read.
	Mismatch,
	/// No record matched the token.
	Missing,
}

/// Error type produced by [`LinkStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A create targeted a token that already exists.
	#[error("Record already exists.")]
	Conflict,
	/// An update targeted a token that does not exist.
	#[error("Record not found.")]
	NotFound,
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// In-process state shared by the built-in stores; every mutation runs under one write lock.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
	#[serde(with = "links_as_vec")]
	pub(crate) links: HashMap<LinkToken, LinkRecord>,
	pub(crate) counter: Option<u64>,
}
impl StoreState {
	pub(crate) fn create(&mut self, record: LinkRecord) -> Result<(), StoreError> {
		if self.links.contains_key(&record.token) {
			return Err(StoreError::Conflict);
		}

		self.links.insert(record.token.clone(), record);

		Ok(())
	}

	pub(crate) fn fetch(&self, token: &LinkToken) -> Option<LinkRecord> {
		self.links.get(token).cloned()
	}

	pub(crate) fn update_last_sent(
		&mut self,
		token: &LinkToken,
		instant: OffsetDateTime,
	) -> Result<(), StoreError> {
		let record = self.links.get_mut(token).ok_or(StoreError::NotFound)?;

		record.last_sent_at = Some(record.last_sent_at.map_or(instant, |prev| prev.max(instant)));

		Ok(())
	}

	pub(crate) fn compare_and_swap_last_sent(
		&mut self,
		token: &LinkToken,
		expected: Option<OffsetDateTime>,
		replacement: Option<OffsetDateTime>,
	) -> CompareAndSwapOutcome {
		match self.links.get_mut(token) {
			Some(record) if record.last_sent_at == expected => {
				record.last_sent_at = replacement;

				CompareAndSwapOutcome::Updated
			},
			Some(_) => CompareAndSwapOutcome::Mismatch,
			None => CompareAndSwapOutcome::Missing,
		}
	}

	pub(crate) fn increment_counter(&mut self) -> u64 {
		let next = self.counter.map_or(1, |count| count.saturating_add(1));

		self.counter = Some(next);

		next
	}

	pub(crate) fn ensure_counter(&mut self) -> u64 {
		*self.counter.get_or_insert(0)
	}
}

mod links_as_vec {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::{
		_prelude::*,
		link::{LinkRecord, LinkToken},
	};

	pub fn serialize<S>(
		links: &HashMap<LinkToken, LinkRecord>,
		serializer: S,
	) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut records: Vec<&LinkRecord> = links.values().collect();

		records.sort_by_key(|record| record.created_at);
		serializer.collect_seq(records)
	}

	pub fn deserialize<'de, D>(
		deserializer: D,
	) -> Result<HashMap<LinkToken, LinkRecord>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let records = <Vec<LinkRecord>>::deserialize(deserializer)?;

		Ok(records.into_iter().map(|record| (record.token.clone(), record)).collect())
	}
}
