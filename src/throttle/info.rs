//! Upstream rate-limit signal parsed from response headers.

// crates.io
use http::HeaderMap;
use time::PrimitiveDateTime;
// self
use crate::_prelude::*;

/// Header carrying the number of requests left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the window reset instant, in seconds since the Unix epoch.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Snapshot of the upstream budget reported by one response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitInfo {
	/// Requests left before the upstream starts rejecting calls.
	pub remaining: u64,
	/// Instant at which the upstream counters reset.
	pub reset_at: OffsetDateTime,
}
impl RateLimitInfo {
	/// Creates a snapshot from already-parsed values.
	pub fn new(remaining: u64, reset_at: OffsetDateTime) -> Self {
		Self { remaining, reset_at }
	}

	/// Extracts the rate-limit pair from response headers.
	///
	/// Returns `None` when either header is missing or not an integer, which callers treat as
	/// "no throttle signal". A negative remaining count is clamped to zero and a reset outside the
	/// representable calendar is clamped to its nearest bound.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let remaining = header_i64(headers, REMAINING_HEADER)?;
		let reset = header_i64(headers, RESET_HEADER)?;
		let reset_at = OffsetDateTime::from_unix_timestamp(reset).unwrap_or_else(|_| {
			if reset.is_negative() {
				PrimitiveDateTime::MIN.assume_utc()
			} else {
				PrimitiveDateTime::MAX.assume_utc()
			}
		});

		Some(Self { remaining: u64::try_from(remaining).unwrap_or(0), reset_at })
	}

	/// Folds two snapshots into one that throttles at least as hard as either.
	pub fn most_restrictive(self, other: Self) -> Self {
		Self {
			remaining: self.remaining.min(other.remaining),
			reset_at: self.reset_at.max(other.reset_at),
		}
	}

	/// Time left until the reset instant, never negative and never longer than `cap`.
	pub fn time_to_reset(&self, now: OffsetDateTime, cap: Duration) -> Duration {
		let left = Duration::try_from(self.reset_at - now).unwrap_or(Duration::ZERO);

		left.min(cap)
	}
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
