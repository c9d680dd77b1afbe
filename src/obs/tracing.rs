// self
use crate::{_prelude::*, obs::LimiterEvent, tenant::TenantId};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedLimiter<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedLimiter<F> = F;

/// A span builder used around limiter waits.
#[derive(Clone, Debug)]
pub struct LimiterSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl LimiterSpan {
	/// Creates a new span tagged with the tenant (when known) and stage.
	pub fn new(tenant: Option<TenantId>, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!(
				"tenant_throttle.limiter",
				tenant = tenant.map(TenantId::get),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (tenant, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedLimiter<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a structured event describing a limiter lifecycle change (when enabled).
pub fn trace_limiter_event(event: LimiterEvent, tenant: Option<TenantId>) {
	#[cfg(feature = "tracing")]
	{
		let tenant = tenant.map(TenantId::get);

		match event {
			LimiterEvent::ObservationCoalesced => {
				tracing::warn!(event = event.as_str(), tenant, "evaluation queue full; observation coalesced")
			},
			LimiterEvent::CooldownStarted | LimiterEvent::Evicted => {
				tracing::info!(event = event.as_str(), tenant, "limiter state changed")
			},
			_ => tracing::debug!(event = event.as_str(), tenant, "limiter state changed"),
		}
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, tenant);
	}
}
