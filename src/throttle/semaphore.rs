//! Cancellable counting semaphore bounding in-flight requests.

// crates.io
use tokio::sync::{OwnedSemaphorePermit, Semaphore as TokioSemaphore, TryAcquireError};
// self
use crate::{_prelude::*, error::AcquireError};

/// Counting semaphore with a fixed capacity.
///
/// Slots are handed out as [`SemaphorePermit`] guards, so every release is matched with exactly
/// one acquire. Closing the semaphore wakes all waiters with [`AcquireError::Closed`].
#[derive(Clone, Debug)]
pub struct Semaphore {
	slots: Arc<TokioSemaphore>,
	capacity: usize,
}
impl Semaphore {
	/// Creates a semaphore with `capacity` free slots.
	pub fn new(capacity: usize) -> Self {
		Self { slots: Arc::new(TokioSemaphore::new(capacity)), capacity }
	}

	/// Total number of slots.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Number of slots currently free.
	pub fn available(&self) -> usize {
		self.slots.available_permits()
	}

	/// Waits for a free slot until `cancel` resolves.
	///
	/// A free slot is taken without polling `cancel`.
	pub async fn acquire<C>(&self, cancel: C) -> Result<SemaphorePermit, AcquireError>
	where
		C: Future<Output = ()>,
	{
		match Arc::clone(&self.slots).try_acquire_owned() {
			Ok(permit) => return Ok(SemaphorePermit(permit)),
			Err(TryAcquireError::Closed) => return Err(AcquireError::Closed),
			Err(TryAcquireError::NoPermits) => {},
		}

		tokio::select! {
			biased;

			permit = Arc::clone(&self.slots).acquire_owned() =>
				permit.map(SemaphorePermit).map_err(|_| AcquireError::Closed),
			_ = cancel => Err(AcquireError::Cancelled),
		}
	}

	/// Closes the semaphore. Pending and future acquires fail with [`AcquireError::Closed`];
	/// outstanding permits stay valid until dropped.
	pub fn close(&self) {
		self.slots.close();
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.slots.is_closed()
	}
}

/// One held semaphore slot. Dropping the permit returns the slot.
#[derive(Debug)]
pub struct SemaphorePermit(OwnedSemaphorePermit);
impl SemaphorePermit {
	/// Returns the slot to the semaphore.
	pub fn release(self) {
		drop(self);
	}
}
