//! Construction-time tunables for limiters and the registry.

// crates.io
use tokio::sync::Semaphore;
// self
use crate::{_prelude::*, error::ConfigError};

/// Per-tenant limiter settings.
///
/// The throttle threshold is independent from the concurrency capacity; when it is left unset the
/// limiter starts a cooldown once the upstream reports no more requests remaining than it may
/// have in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
	/// Maximum number of concurrent in-flight requests.
	pub max_concurrent: usize,
	/// Start a cooldown when the upstream reports this many or fewer remaining requests.
	pub throttle_threshold: Option<u64>,
	/// Upper bound for a single cooldown, in seconds.
	pub max_cooldown_secs: u64,
}
impl LimiterConfig {
	const DEFAULT_MAX_CONCURRENT: usize = 100;
	const DEFAULT_MAX_COOLDOWN_SECS: u64 = 60 * 60;

	/// Creates a configuration with the given concurrency capacity and default cooldown bounds.
	pub fn new(max_concurrent: usize) -> Self {
		Self { max_concurrent, ..Default::default() }
	}

	/// Overrides the remaining-request threshold that trips a cooldown.
	pub fn with_throttle_threshold(mut self, threshold: u64) -> Self {
		self.throttle_threshold = Some(threshold);

		self
	}

	/// Overrides the maximum cooldown length, rounding sub-second remainders up.
	pub fn with_max_cooldown(mut self, cooldown: Duration) -> Self {
		self.max_cooldown_secs =
			cooldown.as_secs().saturating_add(u64::from(cooldown.subsec_nanos() > 0));

		self
	}

	/// Threshold actually applied to observed responses.
	pub fn effective_threshold(&self) -> u64 {
		self.throttle_threshold
			.unwrap_or_else(|| u64::try_from(self.max_concurrent).unwrap_or(u64::MAX))
	}

	/// Maximum cooldown as a [`Duration`].
	pub fn max_cooldown(&self) -> Duration {
		Duration::from_secs(self.max_cooldown_secs)
	}

	/// Rejects settings that could never admit a request or that exceed the semaphore's range.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_concurrent == 0 {
			return Err(ConfigError::ZeroConcurrency);
		}
		if self.max_concurrent > Semaphore::MAX_PERMITS {
			return Err(ConfigError::ConcurrencyTooLarge {
				max_concurrent: self.max_concurrent,
				limit: Semaphore::MAX_PERMITS,
			});
		}

		Ok(())
	}
}
impl Default for LimiterConfig {
	fn default() -> Self {
		Self {
			max_concurrent: Self::DEFAULT_MAX_CONCURRENT,
			throttle_threshold: None,
			max_cooldown_secs: Self::DEFAULT_MAX_COOLDOWN_SECS,
		}
	}
}

/// Registry settings: the per-tenant limiter template plus the tenant capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
	/// Settings applied to every limiter the registry creates.
	#[serde(flatten)]
	pub limiter: LimiterConfig,
	/// Maximum number of live tenant limiters before LRU eviction kicks in.
	pub max_tenants: usize,
}
impl RegistryConfig {
	const DEFAULT_MAX_TENANTS: usize = 1_000;

	/// Creates a registry configuration from a limiter template and a tenant capacity.
	pub fn new(limiter: LimiterConfig, max_tenants: usize) -> Self {
		Self { limiter, max_tenants }
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(raw)?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the tenant capacity.
	pub fn with_max_tenants(mut self, max_tenants: usize) -> Self {
		self.max_tenants = max_tenants;

		self
	}

	/// Rejects settings that could never hold a limiter.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.limiter.validate()?;

		if self.max_tenants == 0 {
			return Err(ConfigError::ZeroTenants);
		}

		Ok(())
	}
}
impl Default for RegistryConfig {
	fn default() -> Self {
		Self { limiter: LimiterConfig::default(), max_tenants: Self::DEFAULT_MAX_TENANTS }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn threshold_defaults_to_concurrency() {
		let config = LimiterConfig::new(25);

		assert_eq!(config.effective_threshold(), 25);
		assert_eq!(config.with_throttle_threshold(3).effective_threshold(), 3);
	}

	#[test]
	fn from_json_applies_defaults_and_validates() {
		let config = RegistryConfig::from_json(r#"{"max_concurrent":4,"max_tenants":2}"#)
			.expect("Minimal registry JSON should parse.");

		assert_eq!(config.limiter.max_concurrent, 4);
		assert_eq!(config.limiter.throttle_threshold, None);
		assert_eq!(config.limiter.max_cooldown(), Duration::from_secs(3600));
		assert_eq!(config.max_tenants, 2);

		let zero = RegistryConfig::from_json(r#"{"max_tenants":0}"#);

		assert!(matches!(zero, Err(ConfigError::ZeroTenants)));

		let broken = RegistryConfig::from_json("{");

		assert!(matches!(broken, Err(ConfigError::Parse { .. })));

		let huge = RegistryConfig::from_json(&format!(
			r#"{{"max_concurrent":{},"max_tenants":1}}"#,
			usize::MAX
		));

		assert!(matches!(
			huge,
			Err(ConfigError::ConcurrencyTooLarge { max_concurrent: usize::MAX, .. })
		));
	}

	#[test]
	fn largest_supported_concurrency_is_accepted() {
		assert!(LimiterConfig::new(Semaphore::MAX_PERMITS).validate().is_ok());
		assert!(matches!(
			LimiterConfig::new(Semaphore::MAX_PERMITS + 1).validate(),
			Err(ConfigError::ConcurrencyTooLarge { .. })
		));
	}

	#[test]
	fn sub_second_cooldown_caps_round_up() {
		let config = LimiterConfig::new(1).with_max_cooldown(Duration::from_millis(250));

		assert_eq!(config.max_cooldown(), Duration::from_secs(1));
		assert_eq!(
			LimiterConfig::new(1).with_max_cooldown(Duration::from_secs(90)).max_cooldown(),
			Duration::from_secs(90)
		);
		assert_eq!(
			LimiterConfig::new(1).with_max_cooldown(Duration::MAX).max_cooldown_secs,
			u64::MAX
		);
	}

	#[test]
	fn zero_concurrency_is_rejected() {
		let config = RegistryConfig::new(LimiterConfig::new(0), 1);

		assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));
	}
}
