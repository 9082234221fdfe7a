//! Append-only audit trail of token operations.
//!
//! Every delegated-token issuance and every token exchange attempt lands here exactly once.
//! Entries are never mutated or removed for the lifetime of the log.

// self
use crate::{_prelude::*, auth::ScopeSet};

/// Kind of audited operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
	/// A user callback produced a delegated token.
	DelegatedTokenObtained,
	/// A sub-agent exchange succeeded.
	TokenExchange,
	/// A sub-agent exchange failed.
	TokenExchangeFailed,
}
impl AuditOperation {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::DelegatedTokenObtained => "delegated_token_obtained",
			Self::TokenExchange => "token_exchange",
			Self::TokenExchangeFailed => "token_exchange_failed",
		}
	}
}
impl Display for AuditOperation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
	/// Instant the entry was recorded.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Audited operation.
	pub operation: AuditOperation,
	/// Agent identity acting in the operation.
	pub actor_subject: String,
	/// End user the token represents, when known.
	pub user_subject: Option<String>,
	/// Audience the token was requested for (`target_service`).
	pub target_audience: Option<String>,
	/// Scopes requested or granted.
	pub scopes: ScopeSet,
	/// Whether the operation succeeded.
	pub success: bool,
	/// Failure message.
	pub error: Option<String>,
}
impl AuditEntry {
	/// Creates a successful entry stamped with the current time.
	pub fn success(operation: AuditOperation, actor_subject: impl Into<String>) -> Self {
		Self {
			timestamp: OffsetDateTime::now_utc(),
			operation,
			actor_subject: actor_subject.into(),
			user_subject: None,
			target_audience: None,
			scopes: ScopeSet::default(),
			success: true,
			error: None,
		}
	}

	/// Creates a failed entry stamped with the current time.
	pub fn failure(
		operation: AuditOperation,
		actor_subject: impl Into<String>,
		error: impl Display,
	) -> Self {
		Self { success: false, error: Some(error.to_string()), ..Self::success(operation, actor_subject) }
	}

	/// Sets the user subject.
	pub fn with_user_subject(mut self, user_subject: Option<String>) -> Self {
		self.user_subject = user_subject;

		self
	}

	/// Sets the target audience.
	pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
		self.target_audience = Some(audience.into());

		self
	}

	/// Sets the scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Alias of [`AuditEntry::target_audience`] under its service-facing name.
	pub fn target_service(&self) -> Option<&str> {
		self.target_audience.as_deref()
	}
}

/// In-process, append-only audit log.
#[derive(Debug, Default)]
pub struct AuditLog {
	entries: RwLock<Vec<AuditEntry>>,
}
impl AuditLog {
	/// Creates an empty log.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `entry` and emits it as a structured event.
	pub fn record(&self, entry: AuditEntry) {
		#[cfg(feature = "tracing")]
		tracing::info!(
			target: "oauth2_delegation_broker::audit",
			operation = %entry.operation,
			actor = %entry.actor_subject,
			user = entry.user_subject.as_deref(),
			audience = entry.target_audience.as_deref(),
			scopes = %entry.scopes,
			success = entry.success,
			error = entry.error.as_deref(),
			"Token operation audited."
		);

		self.entries.write().push(entry);
	}

	/// Snapshot of every entry in insertion order.
	pub fn entries(&self) -> Vec<AuditEntry> {
		self.entries.read().clone()
	}

	/// Most recent entry.
	pub fn last(&self) -> Option<AuditEntry> {
		self.entries.read().last().cloned()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Entries whose target audience equals `audience`.
	pub fn for_audience(&self, audience: &str) -> Vec<AuditEntry> {
		self.entries
			.read()
			.iter()
			.filter(|entry| entry.target_audience.as_deref() == Some(audience))
			.cloned()
			.collect()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn log_is_append_only_and_queryable() {
		let log = AuditLog::new();
		let scopes = ScopeSet::new(["hr:write"]).expect("Scope fixture should be valid.");

		assert!(log.is_empty());

		log.record(
			AuditEntry::success(AuditOperation::TokenExchange, "hr-agent-id")
				.with_target_audience("onboarding-api")
				.with_scopes(scopes.clone()),
		);
		log.record(
			AuditEntry::failure(AuditOperation::TokenExchangeFailed, "it-agent-id", "invalid_target")
				.with_target_audience("it-api"),
		);

		assert_eq!(log.len(), 2);
		assert_eq!(log.for_audience("onboarding-api").len(), 1);

		let last = log.last().expect("Log should have a last entry.");

		assert!(!last.success);
		assert_eq!(last.error.as_deref(), Some("invalid_target"));
		assert_eq!(last.target_service(), Some("it-api"));
		assert_eq!(log.entries()[0].scopes, scopes);
	}

	#[test]
	fn entries_serialize_with_snake_case_operations() {
		let entry = AuditEntry::success(AuditOperation::DelegatedTokenObtained, "orchestrator")
			.with_user_subject(Some("alice".into()));
		let value = serde_json::to_value(&entry).expect("Entry should serialize.");

		assert_eq!(value["operation"], "delegated_token_obtained");
		assert_eq!(value["user_subject"], "alice");
		assert_eq!(value["scopes"], serde_json::json!([]));

		let back: AuditEntry = serde_json::from_value(value).expect("Entry should deserialize.");

		assert_eq!(back.operation, AuditOperation::DelegatedTokenObtained);
	}
}
