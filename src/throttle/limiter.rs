//! Composite limiter pairing a cooldown gate with a concurrency semaphore.

// std
use std::future;
// crates.io
use http::HeaderMap;
// self
use crate::{
	_prelude::*,
	config::LimiterConfig,
	error::{AcquireError, ConfigError},
	obs::{self, LimiterEvent, LimiterSpan},
	tenant::TenantId,
	throttle::{Semaphore, SemaphorePermit, ThrottleGate},
};

/// Cheaply cloneable handle to one tenant's limiter.
///
/// Requests pass straight through until a response reports `remaining <= threshold`; from then
/// on [`acquire`](Self::acquire) blocks until the reported reset time. Independently, at most
/// `max_concurrent` permits are outstanding at any moment.
#[derive(Clone)]
pub struct RateLimiter(Arc<LimiterInner>);
impl RateLimiter {
	/// Creates a limiter and spawns its evaluator on the current Tokio runtime.
	pub fn new(config: &LimiterConfig) -> Result<Self, ConfigError> {
		Self::build(config, None)
	}

	pub(crate) fn for_tenant(
		config: &LimiterConfig,
		tenant: TenantId,
	) -> Result<Self, ConfigError> {
		Self::build(config, Some(tenant))
	}

	fn build(config: &LimiterConfig, tenant: Option<TenantId>) -> Result<Self, ConfigError> {
		config.validate()?;

		let gate = ThrottleGate::spawn(config, tenant)?;
		let semaphore = Semaphore::new(config.max_concurrent);

		Ok(Self(Arc::new(LimiterInner { gate, semaphore, tenant })))
	}

	/// Waits for a permit without a cancellation signal.
	pub async fn acquire(&self) -> Result<RateLimitPermit, AcquireError> {
		self.acquire_until(future::pending()).await
	}

	/// Waits for a permit for at most `timeout`.
	pub async fn acquire_timeout(
		&self,
		timeout: Duration,
	) -> Result<RateLimitPermit, AcquireError> {
		self.acquire_until(tokio::time::sleep(timeout)).await
	}

	/// Waits for the gate to open and then for a free slot, giving up when `cancel` resolves.
	///
	/// The gate is passed before a slot is taken, so a cooldown never ties up concurrency. A
	/// cancellation in either stage returns [`AcquireError::Cancelled`] without holding a slot.
	pub async fn acquire_until<C>(&self, cancel: C) -> Result<RateLimitPermit, AcquireError>
	where
		C: Future<Output = ()>,
	{
		let inner = &self.0;
		let span = LimiterSpan::new(inner.tenant, "acquire");
		let result = span
			.instrument(async move {
				tokio::pin!(cancel);

				inner.gate.acquire(cancel.as_mut()).await?;

				inner.semaphore.acquire(cancel.as_mut()).await
			})
			.await;

		match result {
			Ok(slot) => Ok(RateLimitPermit { slot: Some(slot), limiter: self.clone() }),
			Err(e) => {
				if e.is_cancelled() {
					obs::emit(LimiterEvent::AcquireCancelled, inner.tenant);
				}

				Err(e)
			},
		}
	}

	/// Closes the semaphore and the gate. Waiters and later acquires fail with
	/// [`AcquireError::Closed`]; outstanding permits may still be released.
	pub fn close(&self) {
		self.0.semaphore.close();

		if self.0.gate.close() {
			obs::emit(LimiterEvent::Closed, self.0.tenant);
		}
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.0.gate.is_closed()
	}

	/// Returns true while a cooldown is in effect.
	pub fn is_throttled(&self) -> bool {
		self.0.gate.is_throttled()
	}

	/// Number of slots currently free.
	pub fn available_permits(&self) -> usize {
		self.0.semaphore.available()
	}

	/// Tenant this limiter was created for, if it came from a registry.
	pub fn tenant(&self) -> Option<TenantId> {
		self.0.tenant
	}

	/// Returns true when both handles refer to the same limiter.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Returns true once the background evaluator has exited.
	pub fn is_worker_finished(&self) -> bool {
		self.0.gate.is_worker_finished()
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("tenant", &self.0.tenant)
			.field("capacity", &self.0.semaphore.capacity())
			.field("available", &self.available_permits())
			.field("gate", &self.0.gate)
			.finish()
	}
}

struct LimiterInner {
	gate: ThrottleGate,
	semaphore: Semaphore,
	tenant: Option<TenantId>,
}

/// One admitted request.
///
/// Hand the response headers back through [`release`](Self::release) so the limiter can react to
/// the upstream budget. Dropping the permit releases it as if no response had been received.
#[must_use = "dropping a permit immediately releases its slot"]
pub struct RateLimitPermit {
	slot: Option<SemaphorePermit>,
	limiter: RateLimiter,
}
impl RateLimitPermit {
	/// Frees the slot, then queues `headers` for cooldown evaluation.
	///
	/// `None` (e.g. the call failed before a response existed) only frees the slot.
	pub fn release(mut self, headers: Option<&HeaderMap>) {
		self.finish(headers);
	}

	/// The limiter that issued this permit.
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	fn finish(&mut self, headers: Option<&HeaderMap>) {
		if let Some(slot) = self.slot.take() {
			slot.release();
			self.limiter.0.gate.add_response(headers);
		}
	}
}
impl Drop for RateLimitPermit {
	fn drop(&mut self) {
		self.finish(None);
	}
}
impl Debug for RateLimitPermit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitPermit")
			.field("tenant", &self.limiter.tenant())
			.field("held", &self.slot.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn limiter(max_concurrent: usize) -> RateLimiter {
		RateLimiter::new(&LimiterConfig::new(max_concurrent)).expect("Limiter should build.")
	}

	#[tokio::test]
	async fn zero_capacity_is_rejected() {
		assert!(matches!(
			RateLimiter::new(&LimiterConfig::new(0)),
			Err(ConfigError::ZeroConcurrency)
		));
	}

	#[tokio::test]
	async fn release_without_response_frees_slot() {
		let limiter = limiter(1);
		let permit = limiter.acquire().await.expect("First permit should be granted.");

		assert_eq!(limiter.available_permits(), 0);

		permit.release(None);

		assert_eq!(limiter.available_permits(), 1);

		let permit = limiter.acquire().await.expect("Slot should be reusable after release.");

		drop(permit);

		assert_eq!(limiter.available_permits(), 1);
		assert!(!limiter.is_throttled());
	}

	#[tokio::test(start_paused = true)]
	async fn throttled_gate_does_not_consume_slots() {
		let limiter = limiter(2);

		limiter
			.acquire()
			.await
			.expect("Permit should be granted.")
			.release(Some(&rate_limit_headers(0, 30)));
		tokio::time::sleep(Duration::from_millis(1)).await;

		assert!(limiter.is_throttled());

		let blocked = limiter.acquire_timeout(Duration::from_millis(10)).await;

		assert_eq!(blocked.err(), Some(AcquireError::Cancelled));
		assert_eq!(limiter.available_permits(), 2);
	}

	#[tokio::test]
	async fn close_is_idempotent_and_fails_fast() {
		let limiter = limiter(1);
		let held = limiter.acquire().await.expect("Permit should be granted.");

		limiter.close();
		limiter.close();

		assert!(limiter.is_closed());
		assert_eq!(limiter.acquire().await.err(), Some(AcquireError::Closed));

		held.release(Some(&rate_limit_headers(0, 30)));
	}

	#[tokio::test]
	async fn permit_debug_reports_state() {
		let limiter = limiter(1);
		let permit = limiter.acquire().await.expect("Permit should be granted.");

		assert!(format!("{permit:?}").contains("held: true"));
		assert!(permit.limiter().ptr_eq(&limiter));
	}
}
