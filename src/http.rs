//! Reqwest integration that routes each request through its tenant's limiter.
//!
//! [`TenantHttpClient`] only sequences the limiter around a single `execute` call: look up the
//! tenant's limiter, wait for a permit, send the request, then release the permit with the
//! response headers (or without them when the transport failed). Request construction,
//! credentials, and retries stay with the caller.

// std
use std::{future, ops::Deref};
// crates.io
use reqwest::{Request, Response};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	obs::LimiterSpan,
	registry::LimiterRegistry,
	tenant::TenantId,
};

/// Reqwest client paired with a shared limiter registry.
#[derive(Clone, Debug)]
pub struct TenantHttpClient {
	client: ReqwestClient,
	registry: Arc<LimiterRegistry>,
}
impl TenantHttpClient {
	/// Uses a default reqwest client.
	pub fn new(registry: Arc<LimiterRegistry>) -> Self {
		Self::with_client(ReqwestClient::default(), registry)
	}

	/// Wraps an existing reqwest client. Share one client across tenants to reuse connections.
	pub fn with_client(client: ReqwestClient, registry: Arc<LimiterRegistry>) -> Self {
		Self { client, registry }
	}

	/// The registry consulted for every request.
	pub fn registry(&self) -> &Arc<LimiterRegistry> {
		&self.registry
	}

	/// Sends `request` on behalf of `tenant`, waiting as long as the limiter requires.
	pub async fn execute(&self, tenant: impl Into<TenantId>, request: Request) -> Result<Response> {
		self.execute_until(tenant, request, future::pending()).await
	}

	/// Sends `request` on behalf of `tenant`, giving up on the wait when `cancel` resolves.
	///
	/// Cancellation only covers the wait for a permit; once the request is on the wire it runs to
	/// completion.
	pub async fn execute_until<C>(
		&self,
		tenant: impl Into<TenantId>,
		request: Request,
		cancel: C,
	) -> Result<Response>
	where
		C: Future<Output = ()>,
	{
		let tenant = tenant.into();
		let limiter = self.registry.get_limiter(tenant)?;
		let permit = limiter.acquire_until(cancel).await?;
		let span = LimiterSpan::new(Some(tenant), "execute");

		match span.instrument(self.client.execute(request)).await {
			Ok(response) => {
				permit.release(Some(response.headers()));

				Ok(response)
			},
			Err(e) => {
				permit.release(None);

				Err(TransportError::from(e).into())
			},
		}
	}
}
impl AsRef<ReqwestClient> for TenantHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
impl Deref for TenantHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
