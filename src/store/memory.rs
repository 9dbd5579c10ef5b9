//! Thread-safe in-memory [`LinkStore`] implementation for local development and tests.

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	link::{LinkRecord, LinkToken},
	store::{
		CompareAndSwapOutcome, CounterWatch, LinkStore, StoreError, StoreFuture, StoreState,
	},
};

type SharedState = Arc<RwLock<StoreState>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
///
/// Every operation runs under a single lock, so per-key reads and counter increments are
/// linearizable.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	state: SharedState,
	counter_tx: Arc<watch::Sender<u64>>,
}
impl MemoryStore {
	fn create_now(state: SharedState, record: LinkRecord) -> Result<(), StoreError> {
		state.write().create(record)
	}

	fn fetch_now(state: SharedState, token: LinkToken) -> Option<LinkRecord> {
		state.read().fetch(&token)
	}

	fn update_last_sent_now(
		state: SharedState,
		token: LinkToken,
		instant: OffsetDateTime,
	) -> Result<(), StoreError> {
		state.write().update_last_sent(&token, instant)
	}

	fn cas_now(
		state: SharedState,
		token: LinkToken,
		expected: Option<OffsetDateTime>,
		replacement: Option<OffsetDateTime>,
	) -> CompareAndSwapOutcome {
		state.write().compare_and_swap_last_sent(&token, expected, replacement)
	}

	fn publish(&self, count: u64) {
		self.counter_tx.send_replace(count);
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		let (counter_tx, _) = watch::channel(0);

		Self { state: Default::default(), counter_tx: Arc::new(counter_tx) }
	}
}
impl LinkStore for MemoryStore {
	fn create(&self, record: LinkRecord) -> StoreFuture<'_, ()> {
		let state = self.state.clone();

		Box::pin(async move { Self::create_now(state, record) })
	}

	fn fetch<'a>(&'a self, token: &'a LinkToken) -> StoreFuture<'a, Option<LinkRecord>> {
		let state = self.state.clone();
		let token = token.to_owned();

		Box::pin(async move { Ok(Self::fetch_now(state, token)) })
	}

	fn update_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		let state = self.state.clone();
		let token = token.to_owned();

		Box::pin(async move { Self::update_last_sent_now(state, token, instant) })
	}

	fn compare_and_swap_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		expected: Option<OffsetDateTime>,
		replacement: Option<OffsetDateTime>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let state = self.state.clone();
		let token = token.to_owned();

		Box::pin(async move { Ok(Self::cas_now(state, token, expected, replacement)) })
	}

	fn increment_counter(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			let mut guard = self.state.write();
			let count = guard.increment_counter();

			// Publish under the lock so watchers never observe counts out of order.
			self.publish(count);

			Ok(count)
		})
	}

	fn ensure_counter(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			let mut guard = self.state.write();
			let count = guard.ensure_counter();

			self.publish(count);

			Ok(count)
		})
	}

	fn counter(&self) -> StoreFuture<'_, Option<u64>> {
		Box::pin(async move { Ok(self.state.read().counter) })
	}

	fn subscribe_counter(&self) -> Option<CounterWatch> {
		Some(self.counter_tx.subscribe())
	}
}
