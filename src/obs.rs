//! Spans and counters around every provider-facing operation.
//!
//! With `tracing`, each operation runs inside an `oauth2_delegation_broker.flow` span tagged
//! with `flow`, `stage`, and (where known) `agent`. With `metrics`, each operation bumps
//! `oauth2_delegation_broker_flow_total{flow, outcome}` and records its latency in
//! `oauth2_delegation_broker_flow_duration_seconds{flow}`. Both are no-ops when disabled.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Operation label shared by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// User consent callback bound to the orchestrator's actor token.
	Delegation,
	/// Three-step actor token acquisition.
	ActorToken,
	/// RFC 8693 downscoping for a sub-agent.
	TokenExchange,
	/// App-only client credentials grant.
	ClientCredentials,
}
impl FlowKind {
	/// Every kind, in label order.
	pub const ALL: [Self; 4] =
		[Self::ActorToken, Self::ClientCredentials, Self::Delegation, Self::TokenExchange];

	/// Metric and span label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Delegation => "delegation",
			Self::ActorToken => "actor_token",
			Self::TokenExchange => "token_exchange",
			Self::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `outcome` label of the flow counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The operation started.
	Attempt,
	/// The operation returned a value.
	Success,
	/// The operation returned an error.
	Failure,
}
impl FlowOutcome {
	/// Outcome of a finished operation.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}

	/// Metric label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`], counting the attempt and its outcome and timing it.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let started = Instant::now();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = FlowSpan::new(kind, stage).instrument(fut).await;

	record_flow_outcome(kind, FlowOutcome::of(&result));
	record_flow_duration(kind, started.elapsed());

	#[cfg(feature = "tracing")]
	if let Err(err) = &result {
		::tracing::warn!(flow = %kind, stage, error = %err, "Identity provider operation failed.");
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(FlowKind::Delegation, "callback", async { Ok(7) }).await;
		let err = observe::<(), _>(FlowKind::Delegation, "callback", async {
			Err(Error::SessionNotFound { id: "missing".into() })
		})
		.await;

		assert_eq!(FlowOutcome::of(&ok), FlowOutcome::Success);
		assert_eq!(ok.ok(), Some(7));
		assert_eq!(FlowOutcome::of(&err), FlowOutcome::Failure);
		assert!(matches!(err, Err(Error::SessionNotFound { .. })));
	}

	#[test]
	fn labels_are_unique() {
		let labels = FlowKind::ALL.map(FlowKind::as_str);

		assert_eq!(labels, ["actor_token", "client_credentials", "delegation", "token_exchange"]);
	}
}
