//! High-level flows: token issuance and message relay.

pub mod common;
pub mod issue;
pub mod relay;

pub use issue::*;
pub use relay::*;

// self
use crate::_prelude::*;

/// How the relay gateway enforces the per-token cooldown under concurrency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownMode {
	/// Check against the record read at the start of the call; two concurrent relays on the same
	/// token may both pass.
	#[default]
	Relaxed,
	/// Claim the window with a compare-and-swap on `last_sent_at` before calling upstream, so at
	/// most one relay per window reaches the provider.
	///
	/// A failed upstream call releases the claim with a second compare-and-swap. If that release
	/// fails or finds the value changed, the claim stays in place until the window elapses; the
	/// caller still receives the upstream error and the release failure is logged at `warn`.
	Strict,
}
impl CooldownMode {
	/// Returns a stable label suitable for config and log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Relaxed => "relaxed",
			Self::Strict => "strict",
		}
	}
}
impl Display for CooldownMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for CooldownMode {
	type Err = UnknownCooldownMode;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"relaxed" => Ok(Self::Relaxed),
			"strict" => Ok(Self::Strict),
			_ => Err(UnknownCooldownMode { value: s.to_owned() }),
		}
	}
}

/// Error returned when parsing an unknown [`CooldownMode`] label.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown cooldown mode `{value}`; expected `relaxed` or `strict`.")]
pub struct UnknownCooldownMode {
	/// Rejected input.
	pub value: String,
}
