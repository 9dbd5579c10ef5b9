//! Disposable, time-limited link tokens that cloak an anonymous-messaging username, relay
//! messages to the upstream provider, and throttle abuse with per-token cooldowns.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod flows;
pub mod link;
pub mod obs;
#[cfg(feature = "server")] pub mod server;
pub mod store;
pub mod upstream;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		flows::{CooldownMode, RelayGateway, TokenIssuer},
		store::{LinkStore, MemoryStore},
		upstream::ReqwestUpstreamClient,
	};

	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = RelayGateway<ReqwestUpstreamClient>;

	/// Builds a reqwest upstream client pointed at `endpoint` that accepts the self-signed
	/// certificates produced by `httpmock` during tests.
	pub fn test_upstream_client(endpoint: &str) -> ReqwestUpstreamClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");
		let endpoint = Url::parse(endpoint).expect("Mock upstream endpoint should parse.");

		ReqwestUpstreamClient::with_client(client, endpoint)
	}

	/// Constructs an issuer + gateway pair sharing one in-memory store and a reqwest upstream
	/// client aimed at `endpoint`.
	pub fn build_test_cloak(
		endpoint: &str,
		mode: CooldownMode,
	) -> (TokenIssuer, ReqwestTestGateway, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn LinkStore> = store_backend.clone();
		let issuer = TokenIssuer::new(store.clone());
		let gateway =
			RelayGateway::new(store, test_upstream_client(endpoint)).with_cooldown_mode(mode);

		(issuer, gateway, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "server")] use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};
