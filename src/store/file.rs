//! Simple file-backed [`LinkStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
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

/// Persists link records and the usage counter to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<StoreState>>,
	counter_tx: Arc<watch::Sender<u64>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot =
			if path.exists() { Self::load_snapshot(&path)? } else { StoreState::default() };
		let (counter_tx, _) = watch::channel(snapshot.counter.unwrap_or(0));

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			counter_tx: Arc::new(counter_tx),
		})
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<StoreState, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(StoreState::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {} at `{}`: {}", path.display(), e.path(), e.inner()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &StoreState) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `mutate` under the write lock and persists the result, rolling the in-memory
	/// state back if the snapshot cannot be written.
	fn mutate<T>(
		&self,
		mutate: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let previous = guard.clone();
		let value = mutate(&mut guard)?;

		if let Err(e) = self.persist_locked(&guard) {
			*guard = previous;

			return Err(e);
		}

		Ok(value)
	}
}
impl LinkStore for FileStore {
	fn create(&self, record: LinkRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|state| state.create(record)) })
	}

	fn fetch<'a>(&'a self, token: &'a LinkToken) -> StoreFuture<'a, Option<LinkRecord>> {
		Box::pin(async move { Ok(self.inner.read().fetch(token)) })
	}

	fn update_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.mutate(|state| state.update_last_sent(token, instant)) })
	}

	fn compare_and_swap_last_sent<'a>(
		&'a self,
		token: &'a LinkToken,
		expected: Option<OffsetDateTime>,
		replacement: Option<OffsetDateTime>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = guard.compare_and_swap_last_sent(token, expected, replacement);

			if !matches!(outcome, CompareAndSwapOutcome::Updated) {
				return Ok(outcome);
			}
			if let Err(e) = self.persist_locked(&guard) {
				guard.compare_and_swap_last_sent(token, replacement, expected);

				return Err(e);
			}

			Ok(outcome)
		})
	}

	fn increment_counter(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let previous = guard.counter;
			let count = guard.increment_counter();

			if let Err(e) = self.persist_locked(&guard) {
				guard.counter = previous;

				return Err(e);
			}

			// Publish under the lock so watchers never observe counts out of order.
			self.counter_tx.send_replace(count);

			Ok(count)
		})
	}

	fn ensure_counter(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			if let Some(count) = self.inner.read().counter {
				return Ok(count);
			}

			self.mutate(|state| Ok(state.ensure_counter()))
		})
	}

	fn counter(&self) -> StoreFuture<'_, Option<u64>> {
		Box::pin(async move { Ok(self.inner.read().counter) })
	}

	fn subscribe_counter(&self) -> Option<CounterWatch> {
		Some(self.counter_tx.subscribe())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::link::ProviderUsername;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"link_cloak_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_record() -> LinkRecord {
		LinkRecord::issue(
			LinkToken::new("fIlE-st0re").expect("Failed to build token fixture."),
			ProviderUsername::new("alice").expect("Failed to build username fixture."),
			macros::datetime!(2025-01-01 00:00 UTC),
		)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let record = build_record();
		let sent_at = macros::datetime!(2025-01-01 00:01 UTC);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.create(record.clone()))
			.expect("Failed to save fixture record to file store.");
		rt.block_on(store.update_last_sent(&record.token, sent_at))
			.expect("Failed to record the send instant.");
		rt.block_on(store.increment_counter()).expect("Failed to bump the usage counter.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(&record.token))
			.expect("Failed to fetch fixture record from file store.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched.provider_username, record.provider_username);
		assert_eq!(fetched.expires_at, record.expires_at);
		assert_eq!(fetched.last_sent_at, Some(sent_at));
		assert_eq!(rt.block_on(reopened.counter()), Ok(Some(1)));
		assert_eq!(reopened.subscribe_counter().map(|rx| *rx.borrow()), Some(1));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn concurrent_increments_publish_the_stored_count() {
		const N: u64 = 64;

		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rx = store.subscribe_counter().expect("File store should support counter watches.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let counts = rt.block_on(async {
			let handles = (0..N)
				.map(|_| {
					let store = store.clone();

					tokio::spawn(async move { store.increment_counter().await })
				})
				.collect::<Vec<_>>();
			let mut counts = Vec::with_capacity(N as usize);

			for handle in handles {
				counts.push(
					handle
						.await
						.expect("Increment task should not panic.")
						.expect("Increment should persist."),
				);
			}

			counts
		});

		assert_eq!(counts.iter().max(), Some(&N));
		assert_eq!(rt.block_on(store.counter()), Ok(Some(N)));
		assert_eq!(*rx.borrow(), N);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_reports_path() {
		let path = temp_path();

		fs::write(&path, br#"{"links":[{"token":"bad"}],"counter":null}"#)
			.expect("Failed to write corrupt snapshot.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshot must fail to load.");

		assert!(matches!(err, StoreError::Serialization { .. }));
		assert!(err.to_string().contains("links"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
