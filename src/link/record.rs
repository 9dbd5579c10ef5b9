//! Link records, their lifecycle checks, and the epoch-millisecond wire format.

// self
use crate::{
	_prelude::*,
	link::{LinkToken, ProviderUsername},
};

/// Fixed validity window of every issued token.
pub const LINK_TTL: Duration = Duration::hours(48);
/// Minimum spacing between two successful relays on the same token.
pub const RELAY_COOLDOWN: Duration = Duration::minutes(3);

/// Lifecycle status of a link record at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
	/// The token accepts messages (subject to the cooldown).
	Active,
	/// The TTL has elapsed.
	Expired,
}

/// Outcome of checking the per-token cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownDecision {
	/// A relay may proceed.
	Allow,
	/// The window is still open for `remaining`.
	Wait {
		/// Time left until the window closes.
		remaining: Duration,
	},
}
impl CooldownDecision {
	/// Whole seconds left in the window, rounded up; zero when allowed.
	pub fn remaining_seconds(&self) -> u64 {
		match self {
			Self::Allow => 0,
			Self::Wait { remaining } => {
				let millis = remaining.whole_milliseconds().max(0) as u64;

				millis.div_ceil(1_000)
			},
		}
	}
}

/// Record persisted for every issued link token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
	/// Opaque token that keys the record.
	pub token: LinkToken,
	/// Identity the token protects; immutable after creation.
	pub provider_username: ProviderUsername,
	/// Creation instant, millisecond precision.
	#[serde(with = "epoch_millis")]
	pub created_at: OffsetDateTime,
	/// `created_at + LINK_TTL`; never recomputed.
	#[serde(with = "epoch_millis")]
	pub expires_at: OffsetDateTime,
	/// Instant of the most recent successful relay, if any.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "epoch_millis::option")]
	pub last_sent_at: Option<OffsetDateTime>,
}
impl LinkRecord {
	/// Creates a record issued at `now` (truncated to milliseconds).
	pub fn issue(
		token: LinkToken,
		provider_username: ProviderUsername,
		now: OffsetDateTime,
	) -> Self {
		let created_at = truncate_to_millis(now);

		Self {
			token,
			provider_username,
			created_at,
			expires_at: created_at + LINK_TTL,
			last_sent_at: None,
		}
	}

	/// Computes the lifecycle status at a given instant.
	///
	/// The expiry instant itself is still active; only strictly later instants are expired.
	pub fn status_at(&self, instant: OffsetDateTime) -> LinkStatus {
		if instant > self.expires_at { LinkStatus::Expired } else { LinkStatus::Active }
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), LinkStatus::Expired)
	}

	/// Evaluates the relay cooldown at `instant`. A record that never relayed is always allowed.
	pub fn cooldown_at(&self, instant: OffsetDateTime, cooldown: Duration) -> CooldownDecision {
		let Some(last_sent_at) = self.last_sent_at else {
			return CooldownDecision::Allow;
		};
		let elapsed = instant - last_sent_at;

		if elapsed < cooldown {
			CooldownDecision::Wait { remaining: cooldown - elapsed }
		} else {
			CooldownDecision::Allow
		}
	}
}

/// Current UTC clock truncated to millisecond precision, matching the stored format.
pub fn now_millis() -> OffsetDateTime {
	truncate_to_millis(OffsetDateTime::now_utc())
}

/// Drops sub-millisecond precision so instants survive the epoch-millisecond encoding.
pub fn truncate_to_millis(instant: OffsetDateTime) -> OffsetDateTime {
	let nanos = instant.nanosecond();

	instant - Duration::nanoseconds(i64::from(nanos % 1_000_000))
}

/// Serde helpers that encode [`OffsetDateTime`] as integer epoch milliseconds.
pub mod epoch_millis {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use crate::_prelude::*;

	/// Serializes an instant as epoch milliseconds.
	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(to_millis(*instant))
	}

	/// Deserializes an instant from epoch milliseconds.
	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		from_millis(millis).map_err(DeError::custom)
	}

	/// Converts an instant into epoch milliseconds.
	pub fn to_millis(instant: OffsetDateTime) -> i64 {
		(instant.unix_timestamp_nanos() / 1_000_000) as i64
	}

	/// Converts epoch milliseconds into an instant.
	pub fn from_millis(millis: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
	}

	/// Optional variant of [`epoch_millis`](self).
	pub mod option {
		// crates.io
		use serde::{Deserializer, Serializer, de::Error as DeError};
		// self
		use crate::_prelude::*;

		/// Serializes an optional instant as epoch milliseconds or `null`.
		pub fn serialize<S>(
			instant: &Option<OffsetDateTime>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match instant {
				Some(value) => serializer.serialize_some(&super::to_millis(*value)),
				None => serializer.serialize_none(),
			}
		}

		/// Deserializes an optional instant from epoch milliseconds or `null`.
		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
		where
			D: Deserializer<'de>,
		{
			<Option<i64>>::deserialize(deserializer)?
				.map(super::from_millis)
				.transpose()
				.map_err(DeError::custom)
		}
	}
}
