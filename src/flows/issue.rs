//! Token issuance: validate a username, persist a fresh link record, and bump the usage counter.

// self
use crate::{
	_prelude::*,
	flows::common,
	link::{self, LinkRecord, LinkToken},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::LinkStore,
};

/// Issues link tokens against an injected [`LinkStore`].
#[derive(Clone)]
pub struct TokenIssuer {
	/// Store receiving new link records and counter increments.
	pub store: Arc<dyn LinkStore>,
}
impl TokenIssuer {
	/// Creates an issuer that writes to `store`.
	pub fn new(store: Arc<dyn LinkStore>) -> Self {
		Self { store }
	}

	/// Issues a token for `provider_username` at the current instant.
	pub async fn issue_token(&self, provider_username: &str) -> Result<LinkToken> {
		self.issue_token_at(provider_username, link::now_millis()).await
	}

	/// Issues a token as if the clock read `now`.
	///
	/// The record write is a create, so a token collision surfaces as [`Error::StoreConflict`].
	/// A failed counter increment is logged and otherwise ignored once the record is stored.
	pub async fn issue_token_at(
		&self,
		provider_username: &str,
		now: OffsetDateTime,
	) -> Result<LinkToken> {
		const KIND: FlowKind = FlowKind::Issue;

		let span = FlowSpan::new(KIND, "issue_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let username = common::parse_username(provider_username)?;
				let token = LinkToken::generate();

				span.record_token(&token.fingerprint());

				self.store.create(LinkRecord::issue(token.clone(), username, now)).await?;

				match self.store.increment_counter().await {
					Ok(count) => tracing::debug!(count, "Usage counter incremented."),
					Err(e) => tracing::warn!(error = %e, "Failed to increment the usage counter."),
				}

				Ok(token)
			})
			.await;

		obs::finish_flow(KIND, &result);

		result
	}
}
impl Debug for TokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenIssuer").finish_non_exhaustive()
	}
}
