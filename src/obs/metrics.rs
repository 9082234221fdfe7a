// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Bumps `oauth2_delegation_broker_flow_total{flow, outcome}`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"oauth2_delegation_broker_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records `elapsed` in `oauth2_delegation_broker_flow_duration_seconds{flow}`.
pub fn record_flow_duration(kind: FlowKind, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("oauth2_delegation_broker_flow_duration_seconds", "flow" => kind.as_str())
		.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, elapsed);
}
