//! Strongly typed identifiers for link tokens and the usernames they protect.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Character count of every issued link token.
pub const LINK_TOKEN_LEN: usize = 10;

const FINGERPRINT_LEN: usize = 12;

macro_rules! impl_str_newtype {
	($name:ident, $kind:literal) => {
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl $name {
			#[doc = concat!("Label used in validation errors for ", $kind, " values.")]
			pub const KIND: &'static str = $kind;
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} cannot be empty.")]
	Empty {
		/// Kind of identifier (username, token).
		kind: &'static str,
	},
	/// The identifier does not have the shape of an issued token.
	#[error("{kind} is malformed.")]
	Malformed {
		/// Kind of identifier (username, token).
		kind: &'static str,
	},
}

/// Real upstream identity hidden behind a link token.
///
/// Surrounding whitespace is trimmed on construction; the trimmed value must be non-empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderUsername(String);
impl ProviderUsername {
	/// Trims and validates a username.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref().trim();

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind: Self::KIND });
		}

		Ok(Self(view.to_owned()))
	}
}
impl Debug for ProviderUsername {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ProviderUsername({})", self.0)
	}
}
impl_str_newtype!(ProviderUsername, "Provider username");

/// Opaque, URL-safe token standing in for a [`ProviderUsername`].
///
/// Tokens are bearer values: anyone holding one can send messages, so [`Debug`] prints a
/// [`fingerprint`](Self::fingerprint) instead of the raw value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkToken(String);
impl LinkToken {
	/// Parses a token received from a caller.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind: Self::KIND });
		}
		if view.len() != LINK_TOKEN_LEN || !view.bytes().all(is_url_safe) {
			return Err(IdentifierError::Malformed { kind: Self::KIND });
		}

		Ok(Self(view.to_owned()))
	}

	/// Generates a fresh token from 60 bits of OS-seeded randomness.
	pub fn generate() -> Self {
		let bytes: [u8; 8] = rand::rng().random();
		let mut encoded = URL_SAFE_NO_PAD.encode(bytes);

		encoded.truncate(LINK_TOKEN_LEN);

		Self(encoded)
	}

	/// Short, non-reversible digest that identifies the token in logs.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());
		let mut encoded = URL_SAFE_NO_PAD.encode(digest);

		encoded.truncate(FINGERPRINT_LEN);

		encoded
	}
}
impl Debug for LinkToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "LinkToken(#{})", self.fingerprint())
	}
}
impl_str_newtype!(LinkToken, "Link token");

fn is_url_safe(b: u8) -> bool {
	b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}
