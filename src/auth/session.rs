//! Forced session termination.
//!
//! [`SessionTerminator`] clears the credential store and tells the hosting application that the
//! user is no longer authenticated. The host decides what that means (usually navigating to the
//! sign-in screen); the client only guarantees the callback fires once per live session.

// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::CredentialStore,
};

/// Callback invoked after the session has been torn down.
pub trait UnauthenticatedHandler
where
	Self: Send + Sync,
{
	/// Called with no arguments once the credential store has been cleared.
	fn on_unauthenticated(&self);
}
impl<F> UnauthenticatedHandler for F
where
	F: Fn() + Send + Sync,
{
	fn on_unauthenticated(&self) {
		self()
	}
}

/// Clears both tokens and notifies the host application.
#[derive(Clone)]
pub struct SessionTerminator {
	store: Arc<dyn CredentialStore>,
	handler: Arc<dyn UnauthenticatedHandler>,
	gate: Arc<AsyncMutex<()>>,
}
impl SessionTerminator {
	/// Creates a terminator over `store` that reports to `handler`.
	pub fn new(store: Arc<dyn CredentialStore>, handler: Arc<dyn UnauthenticatedHandler>) -> Self {
		Self { store, handler, gate: Default::default() }
	}

	/// Ends the session.
	///
	/// Returns `true` when credentials were present and the handler was notified, `false` when
	/// the session was already gone. Concurrent calls are serialized, so only the first one
	/// observes credentials. A store that cannot be read or cleared is still treated as signed
	/// out: the handler fires and the caller is never handed an error.
	pub async fn terminate(&self) -> bool {
		const KIND: OpKind = OpKind::Terminate;

		let span = OpSpan::new(KIND, "terminate");

		span.instrument(async move {
			let _serial = self.gate.lock().await;
			let present = match self.store.load().await {
				Ok(credentials) => !credentials.is_empty(),
				Err(_) => true,
			};

			if !present {
				obs::record_op_outcome(KIND, OpOutcome::Skipped);

				return false;
			}

			let cleared = self.store.clear().await;

			#[cfg(feature = "tracing")]
			{
				if let Err(e) = &cleared {
					tracing::warn!(error = %e, "credential store could not be cleared during sign-out");
				}
			}

			obs::record_op_outcome(
				KIND,
				if cleared.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
			);
			self.handler.on_unauthenticated();

			true
		})
		.await
	}
}
impl Debug for SessionTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SessionTerminator(..)")
	}
}
