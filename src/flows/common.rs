//! Shared input validation for the issue and relay flows.

// self
use crate::{
	_prelude::*,
	link::{IdentifierError, LinkToken, ProviderUsername},
};

/// Wire name of the username field on the create-link request.
pub const FIELD_PROVIDER_USERNAME: &str = "providerUsername";
/// Wire name of the token field on the send-message request.
pub const FIELD_DISGUISED_ID: &str = "disguisedId";
/// Wire name of the message field on the send-message request.
pub const FIELD_MESSAGE_TEXT: &str = "messageText";

/// Validates a caller-supplied username, mapping every rejection to [`Error::InvalidInput`].
pub fn parse_username(raw: &str) -> Result<ProviderUsername> {
	ProviderUsername::new(raw).map_err(|_| Error::InvalidInput { field: FIELD_PROVIDER_USERNAME })
}

/// Fails with [`Error::InvalidInput`] when `raw` is blank after trimming.
pub fn require_non_empty<'a>(raw: &'a str, field: &'static str) -> Result<&'a str> {
	if raw.trim().is_empty() {
		return Err(Error::InvalidInput { field });
	}

	Ok(raw)
}

/// Parses a non-blank token.
///
/// A value that cannot be an issued token can never resolve to a record, so it is reported as
/// [`Error::TokenNotFound`] rather than as bad input.
pub fn parse_token(raw: &str) -> Result<LinkToken> {
	let raw = require_non_empty(raw, FIELD_DISGUISED_ID)?.trim();

	LinkToken::new(raw).map_err(|e| match e {
		IdentifierError::Empty { .. } => Error::InvalidInput { field: FIELD_DISGUISED_ID },
		IdentifierError::Malformed { .. } => Error::TokenNotFound,
	})
}
