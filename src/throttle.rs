//! Per-tenant throttling primitives.
//!
//! A [`RateLimiter`] admits a request only after its [`ThrottleGate`] is open and a
//! [`Semaphore`] slot is free. The gate closes when an upstream response reports that few requests
//! remain, and reopens once the reported reset time has passed.
//!
//! Every blocking call accepts a cancellation future. The future is only consulted while the call
//! would otherwise block, so an already-fired signal never prevents a permit that is immediately
//! available from being granted.

pub mod gate;
pub mod info;
pub mod limiter;
pub mod semaphore;

pub use gate::*;
pub use info::*;
pub use limiter::*;
pub use semaphore::*;
