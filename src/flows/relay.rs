//! Message relay: resolve a link token, enforce expiry and cooldown, and forward one message to
//! the upstream provider.
//!
//! [`RelayGateway::relay_message`] walks a fixed state machine per call: validate input, look up
//! the record, reject expired tokens, enforce the per-token cooldown, submit upstream, and only
//! then record `last_sent_at`. An upstream failure leaves the record untouched so the sender can
//! retry at once. In [`CooldownMode::Strict`] the cooldown window is claimed through
//! [`LinkStore::compare_and_swap_last_sent`] before the upstream call and released again if the
//! provider refuses the message.

mod metrics;

pub use self::metrics::RelayMetrics;

// self
use crate::{
	_prelude::*,
	error::ErrorClass,
	flows::{CooldownMode, common},
	link::{self, CooldownDecision, LinkRecord, LinkToken, RELAY_COOLDOWN},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CompareAndSwapOutcome, LinkStore},
	upstream::{Submission, UpstreamClient},
};
#[cfg(feature = "reqwest")] use crate::upstream::ReqwestUpstreamClient;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest upstream client.
pub type ReqwestRelayGateway = RelayGateway<ReqwestUpstreamClient>;

/// Acknowledgement returned once the provider accepted a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
	/// Instant recorded as the token's `last_sent_at`.
	pub sent_at: OffsetDateTime,
}

/// Relays anonymous messages for issued link tokens.
pub struct RelayGateway<C>
where
	C: ?Sized + UpstreamClient,
{
	/// Store holding link records.
	pub store: Arc<dyn LinkStore>,
	/// Client used for every upstream submission.
	pub upstream: Arc<C>,
	/// Cooldown enforcement strategy.
	pub mode: CooldownMode,
	/// Shared in-process counters for relay outcomes.
	pub metrics: Arc<RelayMetrics>,
}
impl<C> RelayGateway<C>
where
	C: ?Sized + UpstreamClient,
{
	/// Creates a gateway in [`CooldownMode::Relaxed`].
	pub fn new(store: Arc<dyn LinkStore>, upstream: impl Into<Arc<C>>) -> Self {
		Self {
			store,
			upstream: upstream.into(),
			mode: CooldownMode::default(),
			metrics: Default::default(),
		}
	}

	/// Overrides the cooldown enforcement strategy.
	pub fn with_cooldown_mode(mut self, mode: CooldownMode) -> Self {
		self.mode = mode;

		self
	}

	/// Relays `message_text` to the provider behind `token` at the current instant.
	pub async fn relay_message(&self, token: &str, message_text: &str) -> Result<Ack> {
		self.relay_message_at(token, message_text, link::now_millis()).await
	}

	/// Relays as if the clock read `now` (truncated to milliseconds).
	pub async fn relay_message_at(
		&self,
		token: &str,
		message_text: &str,
		now: OffsetDateTime,
	) -> Result<Ack> {
		const KIND: FlowKind = FlowKind::Relay;

		let now = link::truncate_to_millis(now);
		let span = FlowSpan::new(KIND, "relay_message");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				common::require_non_empty(token, common::FIELD_DISGUISED_ID)?;

				let message_text =
					common::require_non_empty(message_text, common::FIELD_MESSAGE_TEXT)?;
				let token = common::parse_token(token)?;

				span.record_token(&token.fingerprint());

				let record = self.store.fetch(&token).await?.ok_or(Error::TokenNotFound)?;

				ensure_relayable(&record, now)?;

				let submission =
					Submission::new(message_text, record.provider_username.as_ref(), now);

				match self.mode {
					CooldownMode::Relaxed => {
						self.submit(&submission).await?;
						self.store.update_last_sent(&token, now).await?;
					},
					CooldownMode::Strict => {
						let previous = self.claim_window(&token, record.last_sent_at, now).await?;

						if let Err(e) = self.submit(&submission).await {
							self.release_window(&token, previous, now).await;

							return Err(e);
						}
					},
				}

				Ok(Ack { sent_at: now })
			})
			.await;

		match &result {
			Ok(_) => self.metrics.record_relayed(),
			Err(e) if e.class() == ErrorClass::Client => self.metrics.record_rejected(),
			Err(_) => self.metrics.record_failed(),
		}

		obs::finish_flow(KIND, &result);

		result
	}

	async fn submit(&self, submission: &Submission) -> Result<()> {
		self.upstream.submit(submission).await.map_err(|e| {
			tracing::warn!(
				status = e.status(),
				body = e.raw_body().unwrap_or_default(),
				"Upstream provider did not accept the message: {e}"
			);

			Error::from(e)
		})
	}

	/// Swaps `last_sent_at` from the value read earlier to `now`, returning the replaced value.
	///
	/// Losing the swap re-evaluates the cooldown against the winner's write; only a window that
	/// is still open turns into [`Error::RateLimited`].
	async fn claim_window(
		&self,
		token: &LinkToken,
		mut expected: Option<OffsetDateTime>,
		now: OffsetDateTime,
	) -> Result<Option<OffsetDateTime>> {
		loop {
			match self.store.compare_and_swap_last_sent(token, expected, Some(now)).await? {
				CompareAndSwapOutcome::Updated => return Ok(expected),
				CompareAndSwapOutcome::Missing => return Err(Error::TokenNotFound),
				CompareAndSwapOutcome::Mismatch => {
					let current = self.store.fetch(token).await?.ok_or(Error::TokenNotFound)?;

					ensure_relayable(&current, now)?;

					expected = current.last_sent_at;
				},
			}
		}
	}

	async fn release_window(
		&self,
		token: &LinkToken,
		previous: Option<OffsetDateTime>,
		claimed: OffsetDateTime,
	) {
		match self.store.compare_and_swap_last_sent(token, Some(claimed), previous).await {
			Ok(CompareAndSwapOutcome::Updated) => {},
			Ok(outcome) => tracing::warn!(
				?outcome,
				"Cooldown claim changed before it could be released; leaving it in place."
			),
			Err(e) => tracing::warn!(error = %e, "Failed to release the cooldown claim."),
		}
	}
}
impl<C> Clone for RelayGateway<C>
where
	C: ?Sized + UpstreamClient,
{
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			upstream: self.upstream.clone(),
			mode: self.mode,
			metrics: self.metrics.clone(),
		}
	}
}
impl<C> Debug for RelayGateway<C>
where
	C: ?Sized + UpstreamClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayGateway")
			.field("mode", &self.mode)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

/// Expiry and cooldown checks shared by both cooldown modes.
fn ensure_relayable(record: &LinkRecord, now: OffsetDateTime) -> Result<()> {
	if record.is_expired_at(now) {
		return Err(Error::TokenExpired { expired_at: record.expires_at });
	}

	let decision = record.cooldown_at(now, RELAY_COOLDOWN);

	if let CooldownDecision::Wait { .. } = decision {
		return Err(Error::RateLimited { remaining_seconds: decision.remaining_seconds() });
	}

	Ok(())
}
