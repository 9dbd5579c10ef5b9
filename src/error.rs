//! Crate-level error types shared across flows, stores, and the upstream client.

// self
use crate::{_prelude::*, store::StoreError, upstream::UpstreamError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// A required request field was empty (after trimming).
	#[error("The `{field}` field is required.")]
	InvalidInput {
		/// Name of the offending field as it appears on the wire.
		field: &'static str,
	},
	/// No link record exists for the supplied token.
	#[error("The link is invalid or has expired.")]
	TokenNotFound,
	/// The link record exists but its TTL has elapsed.
	#[error("This link has expired.")]
	TokenExpired {
		/// Instant the record stopped accepting messages.
		expired_at: OffsetDateTime,
	},
	/// The per-token cooldown window is still open.
	#[error(
		"Only one message can be sent every 3 minutes. Try again in {remaining_seconds} seconds."
	)]
	RateLimited {
		/// Whole seconds (rounded up) until the window closes.
		remaining_seconds: u64,
	},
	/// The upstream provider did not accept the message.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Token creation collided with an existing record.
	#[error("A link with the generated token already exists.")]
	StoreConflict,
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[source] StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns whether the failure was caused by the caller or by the system.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::InvalidInput { .. }
			| Self::TokenNotFound
			| Self::TokenExpired { .. }
			| Self::RateLimited { .. } => ErrorClass::Client,
			Self::Upstream(_) | Self::StoreConflict | Self::Storage(_) | Self::Config(_) =>
				ErrorClass::System,
		}
	}

	/// Short, stable label for logs and metrics.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::InvalidInput { .. } => "invalid_input",
			Self::TokenNotFound => "token_not_found",
			Self::TokenExpired { .. } => "token_expired",
			Self::RateLimited { .. } => "rate_limited",
			Self::Upstream(_) => "upstream",
			Self::StoreConflict => "store_conflict",
			Self::Storage(_) | Self::Config(_) => "internal",
		}
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Conflict => Self::StoreConflict,
			other => Self::Storage(other),
		}
	}
}

/// Whether an [`Error`] is a user-actionable outcome or a system failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
	/// The caller can fix the request (bad input, unknown/expired token, cooldown).
	Client,
	/// The service or one of its collaborators failed.
	System,
}
impl ErrorClass {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorClass::Client => "client",
			ErrorClass::System => "system",
		}
	}
}
impl Display for ErrorClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// The upstream endpoint is not a valid absolute URL.
	#[error("Upstream endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The upstream endpoint uses a scheme other than http or https.
	#[error("Upstream endpoint must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme found on the configured endpoint.
		scheme: String,
	},
	/// An environment variable held a value that could not be parsed.
	#[error("Environment variable `{key}` has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Raw value read from the environment.
		value: String,
	},
	/// The upstream timeout must be positive.
	#[error("The upstream timeout must be at least one second.")]
	ZeroTimeout,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_conflict_maps_to_dedicated_variant() {
		let err: Error = StoreError::Conflict.into();

		assert!(matches!(err, Error::StoreConflict));
		assert_eq!(err.class(), ErrorClass::System);
	}

	#[test]
	fn store_backend_error_keeps_source() {
		let store_error = StoreError::Backend { message: "disk unreachable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("disk unreachable"));

		let source = std::error::Error::source(&err)
			.expect("Storage error should expose the underlying store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn rate_limited_message_carries_remaining_seconds() {
		let err = Error::RateLimited { remaining_seconds: 42 };

		assert!(err.to_string().contains("42 seconds"));
		assert_eq!(err.class(), ErrorClass::Client);
		assert_eq!(err.label(), "rate_limited");
	}

	#[test]
	fn upstream_error_hides_raw_body() {
		let err: Error = UpstreamError::Rejected {
			status: 503,
			retry_after: None,
			body: "internal stack trace".into(),
		}
		.into();

		assert_eq!(err.class(), ErrorClass::System);
		assert!(!err.to_string().contains("internal stack trace"));
	}
}
