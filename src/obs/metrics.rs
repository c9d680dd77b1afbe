// self
use crate::obs::LimiterEvent;

/// Records a limiter event via the global metrics recorder (when enabled).
pub fn record_limiter_event(event: LimiterEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("tenant_throttle_event_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_limiter_event_noop_without_metrics() {
		record_limiter_event(LimiterEvent::CooldownLifted);
	}
}
