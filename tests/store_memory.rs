// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use link_cloak::{
	link::{LINK_TTL, LinkRecord, LinkToken, ProviderUsername},
	store::{CompareAndSwapOutcome, LinkStore, MemoryStore, StoreError},
};

fn build_record(token: &str) -> LinkRecord {
	LinkRecord::issue(
		LinkToken::new(token).expect("Token fixture should parse."),
		ProviderUsername::new("alice").expect("Username fixture should parse."),
		issued_at(),
	)
}

fn issued_at() -> OffsetDateTime {
	macros::datetime!(2025-11-10 12:00 UTC)
}

#[tokio::test]
async fn create_fetch_and_conflict() {
	let store = MemoryStore::default();
	let record = build_record("mem-store1");

	assert_eq!(store.fetch(&record.token).await, Ok(None));

	store.create(record.clone()).await.expect("Creating the record should succeed.");

	let fetched = store
		.fetch(&record.token)
		.await
		.expect("Fetching the record should succeed.")
		.expect("Stored record should remain present.");

	assert_eq!(fetched, record);
	assert_eq!(fetched.expires_at - fetched.created_at, LINK_TTL);
	assert_eq!(store.create(record).await, Err(StoreError::Conflict));
}

#[tokio::test]
async fn update_last_sent_is_partial_and_requires_record() {
	let store = MemoryStore::default();
	let record = build_record("mem-store2");
	let sent_at = issued_at() + Duration::minutes(2);

	assert_eq!(
		store.update_last_sent(&record.token, sent_at).await,
		Err(StoreError::NotFound)
	);

	store.create(record.clone()).await.expect("Creating the record should succeed.");
	store.update_last_sent(&record.token, sent_at).await.expect("Update should succeed.");

	let fetched = store
		.fetch(&record.token)
		.await
		.expect("Fetching the record should succeed.")
		.expect("Stored record should remain present.");

	assert_eq!(fetched.last_sent_at, Some(sent_at));
	assert_eq!(fetched.provider_username, record.provider_username);
	assert_eq!(fetched.expires_at, record.expires_at);
}

#[tokio::test]
async fn compare_and_swap_reports_each_outcome() {
	let store = MemoryStore::default();
	let record = build_record("mem-store3");
	let first = issued_at() + Duration::minutes(1);
	let second = issued_at() + Duration::minutes(5);
	let missing = LinkToken::new("mem-absent").expect("Token fixture should parse.");

	store.create(record.clone()).await.expect("Creating the record should succeed.");

	assert_eq!(
		store.compare_and_swap_last_sent(&missing, None, Some(first)).await,
		Ok(CompareAndSwapOutcome::Missing)
	);
	assert_eq!(
		store.compare_and_swap_last_sent(&record.token, None, Some(first)).await,
		Ok(CompareAndSwapOutcome::Updated)
	);
	assert_eq!(
		store.compare_and_swap_last_sent(&record.token, None, Some(second)).await,
		Ok(CompareAndSwapOutcome::Mismatch)
	);
	assert_eq!(
		store.compare_and_swap_last_sent(&record.token, Some(first), None).await,
		Ok(CompareAndSwapOutcome::Updated)
	);
}

#[tokio::test]
async fn counter_watchers_observe_every_increment() {
	let store = MemoryStore::default();
	let mut watch = store.subscribe_counter().expect("Memory store should support watchers.");

	assert_eq!(store.counter().await, Ok(None));
	assert_eq!(store.ensure_counter().await, Ok(0));
	assert_eq!(store.increment_counter().await, Ok(1));

	watch.changed().await.expect("Counter sender should stay alive.");

	assert_eq!(*watch.borrow_and_update(), 1);
	assert_eq!(store.increment_counter().await, Ok(2));
	assert_eq!(store.ensure_counter().await, Ok(2));
	assert_eq!(store.counter().await, Ok(Some(2)));
}
