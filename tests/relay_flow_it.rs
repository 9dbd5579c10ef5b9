// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use link_cloak::{
	_preludet::*,
	flows::{CooldownMode, RelayGateway, TokenIssuer},
	link::LinkToken,
	store::{LinkStore, MemoryStore},
	upstream::{DEFAULT_ORIGIN, DEFAULT_USER_AGENT, UpstreamError},
};

const SUBMIT_PATH: &str = "/api/submit";

async fn last_sent(store: &dyn LinkStore, token: &LinkToken) -> Option<OffsetDateTime> {
	store
		.fetch(token)
		.await
		.expect("Store fetch should succeed.")
		.expect("Issued record should remain present.")
		.last_sent_at
}

#[tokio::test]
async fn relay_posts_browser_headers_and_enforces_cooldown() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(SUBMIT_PATH)
				.header("content-type", "application/json")
				.header("origin", DEFAULT_ORIGIN)
				.header("user-agent", DEFAULT_USER_AGENT);
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let (issuer, gateway, store) =
		build_test_cloak(&server.url(SUBMIT_PATH), CooldownMode::Relaxed);
	let token = issuer.issue_token("alice").await.expect("Issuing a token should succeed.");
	let ack = gateway.relay_message(&token, "hi").await.expect("First relay should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(last_sent(store.as_ref(), &token).await, Some(ack.sent_at));

	let err = gateway
		.relay_message(&token, "hi2")
		.await
		.expect_err("Immediate second relay should be rate limited.");

	match err {
		Error::RateLimited { remaining_seconds } => assert!(
			(179..=180).contains(&remaining_seconds),
			"Unexpected remaining seconds {remaining_seconds}."
		),
		other => panic!("Expected RateLimited, got {other:?}."),
	}

	mock.assert_calls_async(1).await;

	assert_eq!(gateway.metrics.relayed(), 1);
	assert_eq!(gateway.metrics.rejected(), 1);
}

#[tokio::test]
async fn upstream_rejection_keeps_raw_body_and_allows_retry() {
	let server = MockServer::start_async().await;
	let failing = server
		.mock_async(|when, then| {
			when.method(POST).path(SUBMIT_PATH);
			then.status(429).header("retry-after", "30").body("{\"error\":\"slow down\"}");
		})
		.await;
	let (issuer, gateway, store) =
		build_test_cloak(&server.url(SUBMIT_PATH), CooldownMode::Relaxed);
	let token = issuer.issue_token("bob").await.expect("Issuing a token should succeed.");
	let err = gateway
		.relay_message(&token, "hello")
		.await
		.expect_err("Upstream rejection should surface as an error.");

	match &err {
		Error::Upstream(UpstreamError::Rejected { status, retry_after, body }) => {
			assert_eq!(*status, 429);
			assert_eq!(*retry_after, Some(Duration::seconds(30)));
			assert_eq!(body, "{\"error\":\"slow down\"}");
		},
		other => panic!("Expected an upstream rejection, got {other:?}."),
	}
	assert!(!err.to_string().contains("slow down"));
	assert_eq!(last_sent(store.as_ref(), &token).await, None);
	assert_eq!(gateway.metrics.failed(), 1);

	failing.delete_async().await;

	let accepting = server
		.mock_async(|when, then| {
			when.method(POST).path(SUBMIT_PATH);
			then.status(200);
		})
		.await;

	gateway.relay_message(&token, "hello").await.expect("Immediate retry should be permitted.");
	accepting.assert_async().await;

	assert!(last_sent(store.as_ref(), &token).await.is_some());
}

#[tokio::test]
async fn slow_upstream_times_out_without_starting_cooldown() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(SUBMIT_PATH);
			then.status(200).delay(StdDuration::from_secs(2));
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let issuer = TokenIssuer::new(store.clone());
	let gateway: ReqwestTestGateway = RelayGateway::new(
		store.clone(),
		test_upstream_client(&server.url(SUBMIT_PATH)).with_timeout(StdDuration::from_millis(200)),
	);
	let token = issuer.issue_token("dave").await.expect("Issuing a token should succeed.");
	let err = gateway
		.relay_message(&token, "anyone there?")
		.await
		.expect_err("Slow upstream should time out.");

	assert!(matches!(err, Error::Upstream(UpstreamError::Timeout)), "Unexpected error {err:?}.");
	assert_eq!(last_sent(store.as_ref(), &token).await, None);
	assert_eq!(gateway.metrics.failed(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn strict_mode_lets_one_concurrent_relay_through() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(SUBMIT_PATH);
			then.status(200);
		})
		.await;
	let (issuer, gateway, _) = build_test_cloak(&server.url(SUBMIT_PATH), CooldownMode::Strict);
	let token = issuer.issue_token("carol").await.expect("Issuing a token should succeed.");
	let (first, second) =
		tokio::join!(gateway.relay_message(&token, "one"), gateway.relay_message(&token, "two"));
	let outcomes = [first, second];

	assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
	assert!(outcomes.iter().any(|r| matches!(r, Err(Error::RateLimited { .. }))));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unknown_token_never_reaches_upstream() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(SUBMIT_PATH);
			then.status(200);
		})
		.await;
	let (_, gateway, _) = build_test_cloak(&server.url(SUBMIT_PATH), CooldownMode::Relaxed);
	let err = gateway
		.relay_message("AAAAAAAAAA", "hi")
		.await
		.expect_err("Unknown token should be rejected.");

	assert!(matches!(err, Error::TokenNotFound));

	mock.assert_calls_async(0).await;
}
