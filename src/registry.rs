//! Bounded per-tenant limiter registry.
//!
//! The registry hands every caller for a tenant the same [`RateLimiter`], creating it on first
//! use. It holds at most `max_tenants` limiters; inserting past that bound evicts the
//! least-recently-used tenant and closes its limiter before the insert returns, so no evaluator
//! outlives its registry entry.

// std
use std::num::NonZeroUsize;
// crates.io
use lru::LruCache;
// self
use crate::{
	_prelude::*,
	config::{LimiterConfig, RegistryConfig},
	error::ConfigError,
	obs::{self, LimiterEvent},
	tenant::TenantId,
	throttle::RateLimiter,
};

/// LRU map from tenant to limiter.
pub struct LimiterRegistry {
	limiters: Mutex<LruCache<TenantId, RateLimiter>>,
	limiter_config: LimiterConfig,
	closed: AtomicBool,
}
impl LimiterRegistry {
	/// Creates an empty registry after validating `config`.
	pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let capacity = NonZeroUsize::new(config.max_tenants).ok_or(ConfigError::ZeroTenants)?;

		Ok(Self {
			limiters: Mutex::new(LruCache::new(capacity)),
			limiter_config: config.limiter,
			closed: AtomicBool::new(false),
		})
	}

	/// Returns the tenant's limiter, creating it on first use.
	///
	/// Lookup and creation happen under one lock, so concurrent callers for an unseen tenant all
	/// receive the same instance. Must be called from within a Tokio runtime when a limiter has to
	/// be created.
	pub fn get_limiter(&self, tenant: impl Into<TenantId>) -> Result<RateLimiter> {
		let tenant = tenant.into();
		let mut limiters = self.limiters.lock();

		if self.is_closed() {
			return Err(Error::RegistryClosed);
		}
		if let Some(limiter) = limiters.get(&tenant) {
			return Ok(limiter.clone());
		}

		let limiter = RateLimiter::for_tenant(&self.limiter_config, tenant)?;

		obs::emit(LimiterEvent::Created, Some(tenant));

		if let Some((evicted_tenant, evicted)) = limiters.push(tenant, limiter.clone()) {
			obs::emit(LimiterEvent::Evicted, Some(evicted_tenant));

			evicted.close();
		}

		Ok(limiter)
	}

	/// Closes every live limiter; later lookups fail with [`Error::RegistryClosed`].
	pub fn close(&self) {
		let mut limiters = self.limiters.lock();

		if self.closed.swap(true, Ordering::AcqRel) {
			return;
		}

		while let Some((_, limiter)) = limiters.pop_lru() {
			limiter.close();
		}
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Number of live limiters.
	pub fn len(&self) -> usize {
		self.limiters.lock().len()
	}

	/// Returns true when no limiter is live.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Maximum number of live limiters.
	pub fn capacity(&self) -> usize {
		self.limiters.lock().cap().get()
	}

	/// Returns true when the tenant has a live limiter, without touching its recency.
	pub fn contains(&self, tenant: impl Into<TenantId>) -> bool {
		self.limiters.lock().contains(&tenant.into())
	}

	/// Live tenants, most recently used first.
	pub fn tenants(&self) -> Vec<TenantId> {
		self.limiters.lock().iter().map(|(tenant, _)| *tenant).collect()
	}

	/// Settings applied to every limiter this registry creates.
	pub fn limiter_config(&self) -> &LimiterConfig {
		&self.limiter_config
	}
}
impl Drop for LimiterRegistry {
	fn drop(&mut self) {
		self.close();
	}
}
impl Debug for LimiterRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LimiterRegistry")
			.field("limiter_config", &self.limiter_config)
			.field("len", &self.len())
			.field("closed", &self.is_closed())
			.finish()
	}
}
