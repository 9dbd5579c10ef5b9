// self
use crate::{_prelude::*, obs::FlowKind};

/// Instrumented future produced by [`FlowSpan::instrument`].
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;

/// A span builder used by issue and relay flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"link_cloak.flow",
			flow = kind.as_str(),
			stage,
			token = tracing::field::Empty
		);

		Self { span }
	}

	/// Attaches the token fingerprint once it is known.
	pub fn record_token(&self, fingerprint: &str) {
		self.span.record("token", fingerprint);
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

/// Installs the global `tracing` subscriber used by the service binary.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Calling this twice is an error reported
/// by the subscriber registry.
#[cfg(feature = "server")]
pub fn init_tracing() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init()
}
