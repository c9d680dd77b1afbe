//! Crate-level error types shared across limiters, the registry, and transports.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(feature = "reqwest")]
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A permit could not be obtained.
	#[error(transparent)]
	Acquire(#[from] AcquireError),
	/// Transport failure (DNS, TCP, TLS).
	#[cfg(feature = "reqwest")]
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The registry was closed and no longer hands out limiters.
	#[error("Limiter registry has been closed.")]
	RegistryClosed,
}

/// Failures returned while waiting for a rate-limit permit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum AcquireError {
	/// The caller's cancellation signal fired before a permit was granted.
	#[error("Permit acquisition was cancelled before a slot became available.")]
	Cancelled,
	/// The limiter was closed; it will never grant another permit.
	#[error("Rate limiter has been closed.")]
	Closed,
}
impl AcquireError {
	/// Returns true when the failure was caused by the caller's cancellation signal.
	pub const fn is_cancelled(self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Per-tenant concurrency must allow at least one in-flight request.
	#[error("max_concurrent must be at least 1.")]
	ZeroConcurrency,
	/// Per-tenant concurrency exceeds what the underlying semaphore can track.
	#[error("max_concurrent is {max_concurrent}, above the supported maximum of {limit}.")]
	ConcurrencyTooLarge {
		/// Requested capacity.
		max_concurrent: usize,
		/// Largest supported capacity.
		limit: usize,
	},
	/// The registry must be able to hold at least one tenant.
	#[error("max_tenants must be at least 1.")]
	ZeroTenants,
	/// Configuration JSON could not be parsed.
	#[error("Configuration JSON is invalid.")]
	Parse {
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Limiters spawn background workers and must be created inside a Tokio runtime.
	#[error("Rate limiters must be created from within a Tokio runtime.")]
	MissingRuntime {
		/// Underlying runtime lookup failure.
		#[source]
		source: tokio::runtime::TryCurrentError,
	},
}
impl From<serde_json::Error> for ConfigError {
	fn from(e: serde_json::Error) -> Self {
		Self::Parse { source: e }
	}
}

/// Transport-level failures (network, IO).
#[cfg(feature = "reqwest")]
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
#[cfg(feature = "reqwest")]
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn acquire_error_converts_into_crate_error() {
		let error: Error = AcquireError::Cancelled.into();

		assert!(matches!(error, Error::Acquire(AcquireError::Cancelled)));
		assert!(AcquireError::Cancelled.is_cancelled());
		assert!(!AcquireError::Closed.is_cancelled());
	}

	#[test]
	fn config_parse_error_exposes_source() {
		let parse = serde_json::from_str::<u32>("not-json")
			.expect_err("Invalid JSON fixture should fail to parse.");
		let error: Error = ConfigError::from(parse).into();

		assert!(matches!(error, Error::Config(ConfigError::Parse { .. })));
		assert!(
			StdError::source(&error).is_some(),
			"Transparent config errors should forward the JSON failure as their source."
		);
	}
}
