// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `oauth2_delegation_broker.flow` span.
///
/// Carries the operation (`flow`), the call site (`stage`), and optionally the acting agent
/// (`agent`). Token values never become span fields.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"oauth2_delegation_broker.flow",
					flow = kind.as_str(),
					stage,
					agent = tracing::field::Empty
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Tags the span with the acting agent.
	pub fn with_agent(self, agent: &str) -> Self {
		#[cfg(feature = "tracing")]
		self.span.record("agent", agent);
		#[cfg(not(feature = "tracing"))]
		let _ = agent;

		self
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		let fut = tracing::Instrument::instrument(fut, self.span.clone());

		fut
	}
}
