//! Cooldown gate driven by upstream rate-limit headers.
//!
//! The gate's state is the current cooldown [`Episode`]: a one-shot signal that is resolved while
//! the gate is open. Starting a cooldown swaps in a fresh unresolved episode; the timer scheduled
//! for that cooldown resolves it, which releases every waiter at once. Only the background
//! evaluator publishes episodes, callers read them through a `watch` channel.
//!
//! Observations travel over a bounded queue. When it is full, the observation is folded into a
//! single overflow slot holding the most restrictive snapshot seen so far, so a throttling signal
//! is never lost and callers never block.

// crates.io
use async_lock::OnceCell;
use http::HeaderMap;
use tokio::{
	runtime::Handle,
	sync::{
		Notify,
		mpsc::{self, error::TrySendError},
		watch,
	},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	config::LimiterConfig,
	error::{AcquireError, ConfigError},
	obs::{self, LimiterEvent},
	tenant::TenantId,
	throttle::RateLimitInfo,
};

/// Queued evaluation request; `None` marks a call that produced no response.
type Observation = Option<RateLimitInfo>;

/// Open/closed gate fed by response observations.
pub struct ThrottleGate {
	episodes: watch::Receiver<Arc<Episode>>,
	observations: mpsc::Sender<Observation>,
	overflow: Arc<Overflow>,
	shutdown: Arc<Notify>,
	closed: AtomicBool,
	worker: JoinHandle<()>,
	tenant: Option<TenantId>,
}
impl ThrottleGate {
	/// Creates an open gate and spawns its evaluator on the current Tokio runtime.
	pub fn new(config: &LimiterConfig) -> Result<Self, ConfigError> {
		Self::spawn(config, None)
	}

	pub(crate) fn spawn(
		config: &LimiterConfig,
		tenant: Option<TenantId>,
	) -> Result<Self, ConfigError> {
		let runtime =
			Handle::try_current().map_err(|source| ConfigError::MissingRuntime { source })?;
		// Sized to the concurrency capacity so in-flight completions always find room.
		let (observation_tx, observation_rx) = mpsc::channel(config.max_concurrent.max(1));
		let (episode_tx, episode_rx) = watch::channel(Arc::new(Episode::opened()));
		let overflow = Arc::new(Overflow::default());
		let shutdown = Arc::new(Notify::new());
		let evaluator = Evaluator {
			observations: observation_rx,
			overflow: Arc::clone(&overflow),
			episodes: episode_tx,
			shutdown: Arc::clone(&shutdown),
			threshold: config.effective_threshold(),
			max_cooldown: config.max_cooldown(),
			tenant,
			timer: None,
		};
		let worker = runtime.spawn(evaluator.run());

		Ok(Self {
			episodes: episode_rx,
			observations: observation_tx,
			overflow,
			shutdown,
			closed: AtomicBool::new(false),
			worker,
			tenant,
		})
	}

	/// Waits until the gate is open or `cancel` resolves.
	///
	/// An open gate returns immediately without polling `cancel`.
	pub async fn acquire<C>(&self, cancel: C) -> Result<(), AcquireError>
	where
		C: Future<Output = ()>,
	{
		tokio::pin!(cancel);

		loop {
			if self.is_closed() {
				return Err(AcquireError::Closed);
			}

			let episode = Arc::clone(&self.episodes.borrow());

			if episode.is_open() {
				return Ok(());
			}

			// Re-check after waking: a newer cooldown may have replaced this one.
			tokio::select! {
				biased;

				_ = episode.wait_open() => {},
				_ = &mut cancel => return Err(AcquireError::Cancelled),
			}
		}
	}

	/// Queues a response's rate-limit headers for evaluation; `None` is a no-op marker.
	pub fn add_response(&self, headers: Option<&HeaderMap>) {
		self.observe(headers.and_then(RateLimitInfo::from_headers));
	}

	/// Queues an already-parsed observation without blocking.
	///
	/// A full queue folds the observation into the overflow slot instead. Observations sent after
	/// [`close`](Self::close) are discarded.
	pub fn observe(&self, observation: Option<RateLimitInfo>) {
		if self.is_closed() {
			return;
		}

		match self.observations.try_send(observation) {
			Ok(()) | Err(TrySendError::Closed(_)) | Err(TrySendError::Full(None)) => {},
			Err(TrySendError::Full(Some(info))) => {
				self.overflow.push(info);

				obs::emit(LimiterEvent::ObservationCoalesced, self.tenant);
			},
		}
	}

	/// Returns true while a cooldown is in effect.
	pub fn is_throttled(&self) -> bool {
		!self.episodes.borrow().is_open()
	}

	/// Stops the evaluator and releases every waiter with [`AcquireError::Closed`].
	///
	/// Returns true only for the call that actually closed the gate.
	pub fn close(&self) -> bool {
		if self.closed.swap(true, Ordering::AcqRel) {
			return false;
		}

		self.shutdown.notify_one();
		self.episodes.borrow().open();

		true
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Returns true once the background evaluator has exited.
	pub fn is_worker_finished(&self) -> bool {
		self.worker.is_finished()
	}
}
impl Debug for ThrottleGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ThrottleGate")
			.field("tenant", &self.tenant)
			.field("throttled", &self.is_throttled())
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// One cooldown episode; open once its signal has resolved.
#[derive(Debug)]
struct Episode {
	signal: OnceCell<()>,
}
impl Episode {
	fn pending() -> Self {
		Self { signal: OnceCell::new() }
	}

	fn opened() -> Self {
		let episode = Self::pending();

		episode.open();

		episode
	}

	fn is_open(&self) -> bool {
		self.signal.is_initialized()
	}

	/// Resolves the signal; returns false if it was already open.
	fn open(&self) -> bool {
		self.signal.set_blocking(()).is_ok()
	}

	async fn wait_open(&self) {
		self.signal.wait().await;
	}
}

/// Most restrictive observation that did not fit in the queue.
#[derive(Debug, Default)]
struct Overflow {
	pending: Mutex<Option<RateLimitInfo>>,
	ready: Notify,
}
impl Overflow {
	fn push(&self, info: RateLimitInfo) {
		{
			let mut pending = self.pending.lock();

			*pending = Some(match pending.take() {
				Some(held) => held.most_restrictive(info),
				None => info,
			});
		}

		self.ready.notify_one();
	}

	fn take(&self) -> Option<RateLimitInfo> {
		self.pending.lock().take()
	}
}

/// Single writer of gate state.
struct Evaluator {
	observations: mpsc::Receiver<Observation>,
	overflow: Arc<Overflow>,
	episodes: watch::Sender<Arc<Episode>>,
	shutdown: Arc<Notify>,
	threshold: u64,
	max_cooldown: Duration,
	tenant: Option<TenantId>,
	timer: Option<JoinHandle<()>>,
}
impl Evaluator {
	async fn run(mut self) {
		loop {
			tokio::select! {
				biased;

				_ = self.shutdown.notified() => break,
				observation = self.observations.recv() => match observation {
					Some(Some(info)) => self.evaluate(info),
					Some(None) => {},
					None => break,
				},
				_ = self.overflow.ready.notified() => {
					if let Some(info) = self.overflow.take() {
						self.evaluate(info);
					}
				},
			}
		}

		self.stop();
	}

	fn evaluate(&mut self, info: RateLimitInfo) {
		if info.remaining > self.threshold {
			return;
		}

		let cooldown = info.time_to_reset(OffsetDateTime::now_utc(), self.max_cooldown);
		let episode = Arc::new(Episode::pending());
		let previous = self.episodes.send_replace(Arc::clone(&episode));

		if let Some(timer) = self.timer.take() {
			timer.abort();
		}
		// Waiters parked on the replaced episode wake up and park again on the new one.
		if previous.open() {
			obs::emit(LimiterEvent::CooldownSuperseded, self.tenant);
		}

		obs::emit(LimiterEvent::CooldownStarted, self.tenant);

		let tenant = self.tenant;

		self.timer = Some(tokio::spawn(async move {
			tokio::time::sleep(cooldown).await;

			if episode.open() {
				obs::emit(LimiterEvent::CooldownLifted, tenant);
			}
		}));
	}

	fn stop(&mut self) {
		if let Some(timer) = self.timer.take() {
			timer.abort();
		}

		self.episodes.borrow().open();
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::future;
	// self
	use super::*;
	use crate::_preludet::*;

	fn gate(max_concurrent: usize) -> ThrottleGate {
		ThrottleGate::new(&LimiterConfig::new(max_concurrent)).expect("Gate should spawn.")
	}

	fn reset_in(delay: Duration) -> OffsetDateTime {
		OffsetDateTime::now_utc() + delay
	}

	async fn settle() {
		tokio::time::sleep(Duration::from_millis(1)).await;
	}

	#[test]
	fn spawning_outside_runtime_is_a_config_error() {
		let outcome = ThrottleGate::new(&LimiterConfig::new(1));

		assert!(matches!(outcome, Err(ConfigError::MissingRuntime { .. })));
	}

	#[tokio::test]
	async fn open_gate_passes_through() {
		let gate = gate(10);

		assert!(!gate.is_throttled());
		gate.acquire(future::ready(())).await.expect("Open gate should not block.");
	}

	#[tokio::test(start_paused = true)]
	async fn low_remaining_blocks_until_reset() {
		let gate = gate(50);

		gate.observe(Some(RateLimitInfo::new(0, reset_in(Duration::from_millis(200)))));
		settle().await;

		assert!(gate.is_throttled());

		let early = gate.acquire(tokio::time::sleep(Duration::from_millis(10))).await;

		assert_eq!(early, Err(AcquireError::Cancelled));

		let started = tokio::time::Instant::now();

		gate.acquire(future::pending()).await.expect("Gate should reopen after the reset.");

		assert!(started.elapsed() >= Duration::from_millis(150));
		assert!(!gate.is_throttled());
	}

	#[tokio::test(start_paused = true)]
	async fn remaining_above_threshold_is_ignored() {
		let gate = ThrottleGate::new(&LimiterConfig::new(10).with_throttle_threshold(5))
			.expect("Gate should spawn.");

		gate.observe(Some(RateLimitInfo::new(6, reset_in(Duration::from_secs(60)))));
		gate.observe(None);
		settle().await;

		assert!(!gate.is_throttled());

		gate.observe(Some(RateLimitInfo::new(5, reset_in(Duration::from_secs(60)))));
		settle().await;

		assert!(gate.is_throttled(), "Remaining equal to the threshold should throttle.");
	}

	#[tokio::test(start_paused = true)]
	async fn newer_cooldown_supersedes_pending_one() {
		let gate = Arc::new(gate(10));

		gate.observe(Some(RateLimitInfo::new(0, reset_in(Duration::from_millis(100)))));
		settle().await;

		let waiter = {
			let gate = Arc::clone(&gate);

			tokio::spawn(async move {
				let started = tokio::time::Instant::now();

				gate.acquire(future::pending()).await.map(|()| started.elapsed())
			})
		};

		settle().await;
		gate.observe(Some(RateLimitInfo::new(0, reset_in(Duration::from_secs(1)))));

		let waited = waiter
			.await
			.expect("Waiter task should not panic.")
			.expect("Waiter should be admitted once the newest cooldown ends.");

		assert!(waited >= Duration::from_millis(900), "Waited only {waited:?}.");
	}

	#[tokio::test(start_paused = true)]
	async fn close_releases_waiters_and_stops_worker() {
		let gate = Arc::new(gate(10));

		gate.add_response(Some(&rate_limit_headers(0, 600)));
		settle().await;

		let waiter = {
			let gate = Arc::clone(&gate);

			tokio::spawn(async move { gate.acquire(future::pending()).await })
		};

		settle().await;

		assert!(gate.close());
		assert_eq!(waiter.await.expect("Waiter task should not panic."), Err(AcquireError::Closed));

		settle().await;

		assert!(gate.is_worker_finished());

		gate.add_response(Some(&rate_limit_headers(0, 600)));

		assert!(!gate.close(), "A second close must be a no-op.");
	}

	#[tokio::test(start_paused = true)]
	async fn full_queue_still_delivers_throttling_observation() {
		let gate = gate(2);

		// Nothing drains the queue until this task yields.
		gate.observe(Some(RateLimitInfo::new(4_000, reset_in(Duration::from_secs(3_600)))));
		gate.observe(Some(RateLimitInfo::new(3_999, reset_in(Duration::from_secs(3_600)))));
		gate.observe(Some(RateLimitInfo::new(0, reset_in(Duration::from_secs(30)))));
		gate.observe(None);
		settle().await;

		assert!(gate.is_throttled(), "An exhausted budget must close the gate even on overflow.");

		let early = gate.acquire(tokio::time::sleep(Duration::from_secs(20))).await;

		assert_eq!(early, Err(AcquireError::Cancelled));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_close_has_a_single_winner() {
		let gate = Arc::new(gate(4));
		let tasks = (0..16)
			.map(|_| {
				let gate = Arc::clone(&gate);

				tokio::spawn(async move { gate.close() })
			})
			.collect::<Vec<_>>();
		let mut winners = 0;

		for task in tasks {
			if task.await.expect("Close task should not panic.") {
				winners += 1;
			}
		}

		assert_eq!(winners, 1);
		assert!(gate.is_closed());
	}
}
