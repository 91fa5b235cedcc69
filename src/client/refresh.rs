//! Single-flight refresh coordinator.
//!
//! The first request routed here after a 401 flips the coordinator from [`RefreshPhase::Idle`] to
//! [`RefreshPhase::Refreshing`] under the state mutex and starts the one refresh cycle on a task
//! the coordinator owns. Every caller, the one that started the cycle included, is parked in a
//! FIFO queue on a one-shot channel and waits under its own deadline; a caller that gives up only
//! leaves the queue. When the cycle finishes it flips the phase back to `Idle` and takes the whole
//! queue in the same critical section, then delivers the outcome (new access token or the shared
//! [`AuthError`](ErrorCode::AuthError)) to each caller in arrival order.
//!
//! A failed cycle ends the session through the [`SessionTerminator`] before callers are released,
//! so any caller that inspects the store afterwards already sees it cleared.

mod metrics;

pub use self::metrics::RefreshMetrics;

// std
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};
// crates.io
use tokio::{sync::oneshot, time::Instant};
// self
use crate::{
	_prelude::*,
	auth::{
		AccessToken, RefreshRequest, RefreshResponse, RefreshToken, SessionTerminator, TokenPair,
	},
	error::{ErrorCode, TransportError},
	http::{DispatchRequest, HttpTransport},
	normalize,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::CredentialStore,
};
use self::metrics::Counter;

type Delivery = Result<AccessToken>;

/// Coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh in flight; the queue is empty.
	Idle,
	/// A refresh cycle is in flight; late arrivals queue up.
	Refreshing,
}

struct PendingContinuation {
	ticket: u64,
	deliver: oneshot::Sender<Delivery>,
}

struct RefreshState {
	phase: RefreshPhase,
	queue: VecDeque<PendingContinuation>,
}
impl Default for RefreshState {
	fn default() -> Self {
		Self { phase: RefreshPhase::Idle, queue: VecDeque::new() }
	}
}

struct Entry {
	ticket: u64,
	receiver: oneshot::Receiver<Delivery>,
	starts_cycle: bool,
}

/// Owns the refresh state machine for one client.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	store: Arc<dyn CredentialStore>,
	terminator: SessionTerminator,
	refresh_url: Url,
	refresh_timeout: Duration,
	metrics: Arc<RefreshMetrics>,
	state: Mutex<RefreshState>,
	next_ticket: AtomicU64,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator.
	pub fn new(
		transport: Arc<T>,
		store: Arc<dyn CredentialStore>,
		terminator: SessionTerminator,
		refresh_url: Url,
		refresh_timeout: Duration,
	) -> Self {
		Self {
			transport,
			store,
			terminator,
			refresh_url,
			refresh_timeout,
			metrics: Default::default(),
			state: Default::default(),
			next_ticket: AtomicU64::new(0),
		}
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Number of callers waiting on the in-flight refresh, the one that started it included.
	pub fn queued(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Shared counters for this coordinator.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Obtains an access token to replay a request that failed with 401.
	///
	/// `stale` is the token the failed request was sent with. Waiting is bounded by `deadline` for
	/// every caller; the refresh call itself is bounded by the refresh timeout and keeps running for
	/// the remaining callers when this one gives up.
	pub async fn acquire(
		self: &Arc<Self>,
		stale: Option<&AccessToken>,
		deadline: Instant,
	) -> Result<AccessToken> {
		let Entry { ticket, receiver, starts_cycle } = self.enter();

		if starts_cycle {
			tokio::spawn(self.clone().run(stale.cloned()));
		}

		self.wait(ticket, receiver, deadline).await
	}

	fn enter(&self) -> Entry {
		let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
		let (deliver, receiver) = oneshot::channel();
		let mut state = self.state.lock();
		let starts_cycle = match state.phase {
			RefreshPhase::Idle => {
				debug_assert!(state.queue.is_empty(), "idle coordinator must have an empty queue");

				state.phase = RefreshPhase::Refreshing;

				true
			},
			RefreshPhase::Refreshing => {
				self.metrics.bump(Counter::Coalesced);
				obs::record_op_outcome(OpKind::Refresh, OpOutcome::Coalesced);

				false
			},
		};

		state.queue.push_back(PendingContinuation { ticket, deliver });

		#[cfg(feature = "tracing")]
		tracing::debug!(ticket, starts_cycle, queued = state.queue.len(), "waiting on refresh");

		Entry { ticket, receiver, starts_cycle }
	}

	async fn wait(
		&self,
		ticket: u64,
		receiver: oneshot::Receiver<Delivery>,
		deadline: Instant,
	) -> Result<AccessToken> {
		match tokio::time::timeout_at(deadline, receiver).await {
			Ok(Ok(delivery)) => delivery,
			Ok(Err(_)) => Err(NormalizedError::new(
				ErrorCode::NetworkError,
				"Session renewal ended without delivering a result.",
			)),
			Err(_) => {
				self.abandon(ticket);

				Err(NormalizedError::new(
					ErrorCode::NetworkError,
					"The request timed out while waiting for the session to be renewed.",
				))
			},
		}
	}

	fn abandon(&self, ticket: u64) {
		let mut state = self.state.lock();

		state.queue.retain(|pending| pending.ticket != ticket);

		#[cfg(feature = "tracing")]
		tracing::debug!(ticket, queued = state.queue.len(), "caller timed out waiting on refresh");
	}

	async fn run(self: Arc<Self>, stale: Option<AccessToken>) {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "cycle");
		let guard = CycleGuard { coordinator: &self, armed: true };

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.bump(Counter::Attempt);

		let result = span.instrument(self.run_cycle(stale.as_ref())).await;

		match &result {
			Ok(_) => {
				self.metrics.bump(Counter::Success);
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(_) => {
				self.metrics.bump(Counter::Failure);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		guard.settle(result);
	}

	async fn run_cycle(&self, stale: Option<&AccessToken>) -> Result<AccessToken> {
		let credentials = match self.store.load().await {
			Ok(credentials) => credentials,
			Err(e) => return self.fail(e.into()).await,
		};

		// Another cycle already rotated the token this request was sent with.
		if let Some(current) = credentials.access_token.filter(|current| Some(current) != stale) {
			return Ok(current);
		}

		let Some(refresh) = credentials.refresh_token else {
			return self
				.fail(NormalizedError::new(ErrorCode::AuthError, "No refresh token is available."))
				.await;
		};
		let pair = match self.request_refresh(&refresh).await {
			Ok(pair) => pair,
			Err(cause) => return self.fail(cause).await,
		};

		if let Err(e) = self.store.replace(pair.clone()).await {
			return self.fail(e.into()).await;
		}

		Ok(pair.access_token)
	}

	async fn request_refresh(&self, refresh: &RefreshToken) -> Result<TokenPair> {
		let body = serde_json::to_vec(&RefreshRequest { refresh_token: refresh.expose() })
			.map_err(|e| {
				NormalizedError::new(
					ErrorCode::UnknownError,
					format!("Refresh request could not be serialized: {e}"),
				)
			})?;
		let mut headers = HeaderMap::new();

		headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

		let request = DispatchRequest {
			method: Method::POST,
			url: self.refresh_url.clone(),
			headers,
			body: Some(body),
		};

		self.metrics.bump(Counter::NetworkCall);

		let sent = tokio::time::timeout(self.refresh_timeout, self.transport.execute(request)).await;
		let response = match sent {
			Ok(Ok(response)) => response,
			Ok(Err(e)) => return Err(normalize::from_transport(&e)),
			Err(_) =>
				return Err(normalize::from_transport(&TransportError::Timeout {
					target: self.refresh_url.to_string(),
				})),
		};

		if !response.is_success() {
			return Err(normalize::from_response(&response));
		}

		let parsed: RefreshResponse = response.json()?;

		Ok(parsed.into())
	}

	async fn fail(&self, cause: NormalizedError) -> Result<AccessToken> {
		#[cfg(feature = "tracing")]
		tracing::warn!(
			code = %cause.code,
			message = %cause.message,
			"token refresh failed; ending session"
		);

		self.terminator.terminate().await;

		Err(normalize::from_refresh_failure(&cause))
	}

	/// Returns to `Idle` and resolves every queued continuation with `delivery`.
	fn settle(&self, delivery: Delivery) {
		let drained = {
			let mut state = self.state.lock();

			state.phase = RefreshPhase::Idle;

			std::mem::take(&mut state.queue)
		};

		#[cfg(feature = "tracing")]
		tracing::debug!(callers = drained.len(), ok = delivery.is_ok(), "refresh cycle settled");

		for pending in drained {
			// Receiver is gone when the caller was dropped.
			let _ = pending.deliver.send(delivery.clone());
		}
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refresh_url", &self.refresh_url.as_str())
			.field("phase", &state.phase)
			.field("queued", &state.queue.len())
			.finish()
	}
}

/// Releases the queue if the cycle task is dropped before it settles (runtime shutdown).
struct CycleGuard<'a, T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: &'a RefreshCoordinator<T>,
	armed: bool,
}
impl<T> CycleGuard<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn settle(mut self, delivery: Delivery) {
		self.armed = false;
		self.coordinator.settle(delivery);
	}
}
impl<T> Drop for CycleGuard<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if self.armed {
			self.coordinator.settle(Err(NormalizedError::new(
				ErrorCode::NetworkError,
				"Session renewal was interrupted before it completed.",
			)));
		}
	}
}
