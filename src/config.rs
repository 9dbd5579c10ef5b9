//! Service configuration: upstream endpoint, headers, timeout, storage, and cooldown mode.

// std
use std::{env, net::SocketAddr, path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::CooldownMode,
	upstream::{DEFAULT_ENDPOINT, DEFAULT_ORIGIN, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT},
};

const ENV_BIND: &str = "LINK_CLOAK_BIND";
const ENV_UPSTREAM_URL: &str = "LINK_CLOAK_UPSTREAM_URL";
const ENV_UPSTREAM_ORIGIN: &str = "LINK_CLOAK_UPSTREAM_ORIGIN";
const ENV_USER_AGENT: &str = "LINK_CLOAK_USER_AGENT";
const ENV_TIMEOUT_SECS: &str = "LINK_CLOAK_UPSTREAM_TIMEOUT_SECS";
const ENV_STORE_PATH: &str = "LINK_CLOAK_STORE_PATH";
const ENV_COOLDOWN_MODE: &str = "LINK_CLOAK_COOLDOWN_MODE";

/// Deployment-provided settings consumed by the service binary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
	/// Socket address the HTTP surface listens on.
	pub bind: SocketAddr,
	/// Upstream submission endpoint; parsed by [`endpoint`](Self::endpoint).
	pub endpoint: String,
	/// `Origin` header sent upstream.
	pub origin: String,
	/// `User-Agent` header sent upstream.
	pub user_agent: String,
	/// Upstream call timeout in seconds.
	pub timeout_secs: u64,
	/// JSON snapshot path; `None` keeps state in memory only.
	pub store_path: Option<PathBuf>,
	/// How the relay gateway enforces the per-token cooldown.
	pub cooldown_mode: CooldownMode,
}
impl ServiceConfig {
	/// Reads overrides from `LINK_CLOAK_*` environment variables on top of the defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Same as [`from_env`](Self::from_env) but reads through `lookup`, which keeps tests
	/// independent of the process environment.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut config = Self::default();

		if let Some(value) = lookup(ENV_BIND) {
			config.bind = parse_env(ENV_BIND, value)?;
		}
		if let Some(value) = lookup(ENV_UPSTREAM_URL) {
			config.endpoint = value.trim().to_owned();
		}
		if let Some(value) = lookup(ENV_UPSTREAM_ORIGIN) {
			config.origin = value;
		}
		if let Some(value) = lookup(ENV_USER_AGENT) {
			config.user_agent = value;
		}
		if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
			config.timeout_secs = parse_env(ENV_TIMEOUT_SECS, value)?;
		}
		if let Some(value) = lookup(ENV_STORE_PATH).filter(|v| !v.trim().is_empty()) {
			config.store_path = Some(PathBuf::from(value));
		}
		if let Some(value) = lookup(ENV_COOLDOWN_MODE) {
			config.cooldown_mode = parse_env(ENV_COOLDOWN_MODE, value)?;
		}

		config.validate()?;

		Ok(config)
	}

	/// Rejects settings the service cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.endpoint()?;
		self.timeout()?;

		Ok(())
	}

	/// Parses the upstream endpoint, accepting only http and https URLs.
	pub fn endpoint(&self) -> Result<Url, ConfigError> {
		let endpoint =
			Url::parse(&self.endpoint).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		match endpoint.scheme() {
			"http" | "https" => Ok(endpoint),
			other => Err(ConfigError::UnsupportedScheme { scheme: other.to_owned() }),
		}
	}

	/// Upstream timeout as a [`std::time::Duration`].
	pub fn timeout(&self) -> Result<StdDuration, ConfigError> {
		if self.timeout_secs == 0 {
			return Err(ConfigError::ZeroTimeout);
		}

		Ok(StdDuration::from_secs(self.timeout_secs))
	}
}
impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
			endpoint: DEFAULT_ENDPOINT.into(),
			origin: DEFAULT_ORIGIN.into(),
			user_agent: DEFAULT_USER_AGENT.into(),
			timeout_secs: DEFAULT_TIMEOUT.as_secs(),
			store_path: None,
			cooldown_mode: CooldownMode::default(),
		}
	}
}

fn parse_env<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
	T: FromStr,
{
	value.trim().parse().map_err(|_| ConfigError::InvalidEnv { key, value })
}
