// self
use crate::{_prelude::*, obs::OpKind};

/// Future returned by [`OpSpan::instrument`]; the input future itself without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; the input future itself without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `session_client.op` span for one client operation.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	inner: tracing::Span,
}
impl OpSpan {
	/// Opens a span labeled with `kind` and the call site `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { inner: tracing::info_span!("session_client.op", op = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the span to `fut`; entered on every poll, never held across `.await`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.inner.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
