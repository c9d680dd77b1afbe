//! Optional observability helpers for limiters and the registry.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `tenant_throttle.limiter` with the `tenant`
//!   and `stage` fields, plus one structured event per [`LimiterEvent`].
//! - Enable `metrics` to increment the `tenant_throttle_event_total` counter for every
//!   [`LimiterEvent`], labeled by `event`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, tenant::TenantId};

/// Lifecycle events emitted by limiters and the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimiterEvent {
	/// The registry created a limiter for a previously unseen tenant.
	Created,
	/// The registry evicted the least-recently-used tenant.
	Evicted,
	/// A limiter was closed and its worker told to stop.
	Closed,
	/// An observed response tripped a cooldown.
	CooldownStarted,
	/// A newer cooldown replaced one that was still pending.
	CooldownSuperseded,
	/// A cooldown timer fired and reopened the gate.
	CooldownLifted,
	/// The evaluation queue was full; the observation was folded into the overflow slot.
	ObservationCoalesced,
	/// A caller's cancellation fired while it waited for a permit.
	AcquireCancelled,
}
impl LimiterEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LimiterEvent::Created => "created",
			LimiterEvent::Evicted => "evicted",
			LimiterEvent::Closed => "closed",
			LimiterEvent::CooldownStarted => "cooldown_started",
			LimiterEvent::CooldownSuperseded => "cooldown_superseded",
			LimiterEvent::CooldownLifted => "cooldown_lifted",
			LimiterEvent::ObservationCoalesced => "observation_coalesced",
			LimiterEvent::AcquireCancelled => "acquire_cancelled",
		}
	}
}
impl Display for LimiterEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reports an event to every enabled backend.
pub fn emit(event: LimiterEvent, tenant: Option<TenantId>) {
	trace_limiter_event(event, tenant);
	record_limiter_event(event);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_snake_case() {
		assert_eq!(LimiterEvent::CooldownStarted.to_string(), "cooldown_started");
		assert_eq!(LimiterEvent::Evicted.as_str(), "evicted");
	}

	#[test]
	fn emit_noop_without_backends() {
		emit(LimiterEvent::Created, Some(TenantId::new(1)));
		emit(LimiterEvent::Closed, None);
	}
}
