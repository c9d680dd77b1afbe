//! Tenant identifiers used to key per-tenant limiters.

// std
use std::num::ParseIntError;
// self
use crate::_prelude::*;

/// Identifier for an independent consumer (e.g. one app installation) whose requests are limited
/// in isolation from every other tenant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(u64);
impl TenantId {
	/// Wraps a raw numeric identifier.
	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	/// Returns the raw numeric identifier.
	pub const fn get(self) -> u64 {
		self.0
	}
}
impl From<u64> for TenantId {
	fn from(value: u64) -> Self {
		Self(value)
	}
}
impl From<TenantId> for u64 {
	fn from(value: TenantId) -> Self {
		value.0
	}
}
impl Debug for TenantId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Tenant({})", self.0)
	}
}
impl Display for TenantId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for TenantId {
	type Err = ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(Self)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_and_displays_numeric_ids() {
		let tenant: TenantId = " 4242".parse().expect("Numeric tenant should parse.");

		assert_eq!(tenant.get(), 4242);
		assert_eq!(tenant.to_string(), "4242");
		assert_eq!(format!("{tenant:?}"), "Tenant(4242)");
		assert!("tenant-1".parse::<TenantId>().is_err());
		assert!("-1".parse::<TenantId>().is_err());
	}

	#[test]
	fn serde_is_transparent() {
		let tenant: TenantId = serde_json::from_str("17").expect("Tenant should deserialize.");

		assert_eq!(tenant, TenantId::new(17));
		assert_eq!(
			serde_json::to_string(&tenant).expect("Tenant should serialize."),
			"17"
		);
	}
}
