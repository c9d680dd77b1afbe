//! Per-tenant throttling for multi-tenant API clients: a bounded concurrency semaphore paired with
//! a cooldown gate driven by upstream rate-limit headers, one limiter per tenant, shared through a
//! bounded LRU registry that tears evicted limiters down before reusing their slot.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod registry;
pub mod tenant;
pub mod throttle;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// crates.io
	use http::{HeaderMap, HeaderValue};
	// self
	use crate::{
		config::{LimiterConfig, RegistryConfig},
		registry::LimiterRegistry,
		throttle::{REMAINING_HEADER, RESET_HEADER},
	};

	/// Builds a header map carrying the rate-limit pair with a reset `reset_in` seconds from now.
	pub fn rate_limit_headers(remaining: i64, reset_in: i64) -> HeaderMap {
		let reset = OffsetDateTime::now_utc().unix_timestamp() + reset_in;
		let mut headers = HeaderMap::new();

		headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
		headers.insert(RESET_HEADER, HeaderValue::from(reset));

		headers
	}

	/// Builds a registry with the given per-tenant concurrency and tenant capacity.
	pub fn build_test_registry(max_concurrent: usize, max_tenants: usize) -> LimiterRegistry {
		let config = RegistryConfig::new(LimiterConfig::new(max_concurrent), max_tenants);

		LimiterRegistry::new(config).expect("Test registry configuration should be valid.")
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		str::FromStr,
		sync::{
			Arc,
			atomic::{AtomicBool, Ordering},
		},
		time::Duration,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(test)] use httpmock as _;

pub use registry::LimiterRegistry;
pub use tenant::TenantId;
pub use throttle::{RateLimitPermit, RateLimiter};
