//! Upstream submission client for the anonymous-messaging provider.
//!
//! The module exposes [`UpstreamClient`] as the gateway's only dependency on an HTTP stack,
//! alongside [`Submission`] (the fixed JSON body) and [`UpstreamError`]. The reqwest-backed
//! [`ReqwestUpstreamClient`] sends exactly one POST per relay with the `User-Agent` and `Origin`
//! headers the provider expects; retries are left to callers.

// std
use std::time::Duration as StdDuration;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::{
	header::{HeaderMap, ORIGIN, RETRY_AFTER, USER_AGENT},
	redirect::Policy,
};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, link::epoch_millis};
#[cfg(feature = "reqwest")] use crate::{config::ServiceConfig, error::ConfigError};

/// Submission endpoint of the reference provider.
pub const DEFAULT_ENDPOINT: &str = "https://ngl.link/api/submit";
/// `Origin` header the reference provider expects.
pub const DEFAULT_ORIGIN: &str = "https://ngl.link";
/// Desktop browser `User-Agent` sent with every submission.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";
/// Upper bound on a single upstream call.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`UpstreamClient::submit`].
pub type UpstreamFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UpstreamError>> + 'a + Send>>;

/// Abstraction over HTTP transports that deliver a [`Submission`] to the provider.
///
/// Implementations must be `Send + Sync + 'static` so a single client can be shared across
/// concurrent relays, and must bound every call with a timeout.
pub trait UpstreamClient
where
	Self: 'static + Send + Sync,
{
	/// Sends one submission; any non-success response is an [`UpstreamError`].
	fn submit<'a>(&'a self, submission: &'a Submission) -> UpstreamFuture<'a>;
}

/// Fixed-shape JSON body posted to the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
	/// Message text relayed verbatim.
	pub question: String,
	/// Provider username the link token resolves to.
	pub username: String,
	/// Synthetic, non-identifying device identifier.
	pub device_id: String,
}
impl Submission {
	/// Builds a submission with a synthetic device id derived from `now`.
	pub fn new(
		question: impl Into<String>,
		username: impl Into<String>,
		now: OffsetDateTime,
	) -> Self {
		Self {
			question: question.into(),
			username: username.into(),
			device_id: Self::synthetic_device_id(now),
		}
	}

	/// `fake-device-id-<epoch millis>`; unique enough per call and carries no sender data.
	pub fn synthetic_device_id(now: OffsetDateTime) -> String {
		format!("fake-device-id-{}", epoch_millis::to_millis(now))
	}
}

/// Failures reported by an [`UpstreamClient`].
///
/// The [`Display`] output never contains the provider's response body; use
/// [`raw_body`](Self::raw_body) for diagnostics.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// The provider answered with a non-success status.
	#[error("Upstream provider rejected the message with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from the provider, if supplied.
		retry_after: Option<Duration>,
		/// Raw response body, kept for logs only.
		body: String,
	},
	/// The call did not complete within the configured timeout.
	#[error("Upstream provider did not respond in time.")]
	Timeout,
	/// DNS, TCP, or TLS failure before a response arrived.
	#[error("Network error occurred while calling the upstream provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Raw provider response body, when the provider answered.
	pub fn raw_body(&self) -> Option<&str> {
		match self {
			Self::Rejected { body, .. } => Some(body),
			_ => None,
		}
	}

	/// HTTP status code, when the provider answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Reqwest-backed [`UpstreamClient`] posting JSON to a single endpoint.
///
/// Redirects are not followed; a redirect from the submission endpoint counts as a rejection.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestUpstreamClient {
	client: ReqwestClient,
	endpoint: Url,
	origin: String,
	user_agent: String,
	timeout: StdDuration,
}
#[cfg(feature = "reqwest")]
impl ReqwestUpstreamClient {
	/// Builds a client for `endpoint` with the default headers and timeout.
	pub fn new(endpoint: Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(DEFAULT_TIMEOUT)
			.build()?;

		Ok(Self::with_client(client, endpoint))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; the default timeout is still applied per
	/// request.
	pub fn with_client(client: ReqwestClient, endpoint: Url) -> Self {
		Self {
			client,
			endpoint,
			origin: DEFAULT_ORIGIN.into(),
			user_agent: DEFAULT_USER_AGENT.into(),
			timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Builds a client from service configuration.
	pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
		let timeout = config.timeout()?;
		let client = ReqwestClient::builder().redirect(Policy::none()).timeout(timeout).build()?;

		Ok(Self::with_client(client, config.endpoint()?)
			.with_origin(config.origin.clone())
			.with_user_agent(config.user_agent.clone())
			.with_timeout(timeout))
	}

	/// Overrides the `Origin` header.
	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = origin.into();

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Submission endpoint this client posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestUpstreamClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamClient for ReqwestUpstreamClient {
	fn submit<'a>(&'a self, submission: &'a Submission) -> UpstreamFuture<'a> {
		Box::pin(async move {
			let response = self
				.client
				.post(self.endpoint.clone())
				.header(USER_AGENT, &self.user_agent)
				.header(ORIGIN, &self.origin)
				.timeout(self.timeout)
				.json(submission)
				.send()
				.await?;
			let status = response.status();

			if status.is_success() {
				return Ok(());
			}

			let retry_after = parse_retry_after(response.headers());
			let body = response
				.text()
				.await
				.unwrap_or_else(|e| format!("<unreadable response body: {e}>"));

			Err(UpstreamError::Rejected { status: status.as_u16(), retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
