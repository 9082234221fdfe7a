mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use oauth2_delegation_broker::{
	audit::AuditOperation,
	auth::{ScopeSet, SessionId},
	broker::DELEGATION_AUDIENCE,
	error::Error,
	store::{
		CompletionOutcome, MemoryStore, Session, SessionCompletion, SessionStatus, SessionStore,
		StoreError, StoreFuture,
	},
};
// self
use common::*;

const DELEGATED_JWT: &str = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJhbGljZSJ9.signature";

/// Store whose completion always fails after the provider has issued a token.
#[derive(Default)]
struct UnwritableStore {
	inner: MemoryStore,
}
impl SessionStore for UnwritableStore {
	fn insert(&self, session: Session) -> StoreFuture<'_, ()> {
		self.inner.insert(session)
	}

	fn get<'a>(&'a self, id: &'a SessionId) -> StoreFuture<'a, Option<Session>> {
		self.inner.get(id)
	}

	fn complete<'a>(
		&'a self,
		_id: &'a SessionId,
		_completion: SessionCompletion,
	) -> StoreFuture<'a, CompletionOutcome> {
		Box::pin(async { Err(StoreError::Backend { message: "disk full".into() }) })
	}
}

async fn mock_orchestrator_actor_flow(server: &MockServer) {
	mock_initiate(server, "orchestrator-flow").await;
	mock_authenticate(server, ORCHESTRATOR_AGENT_ID, "orchestrator-actor-code").await;
	mock_code_grant(server, "orchestrator-actor-code", "orchestrator-actor-token").await;
}

#[tokio::test]
async fn initialize_caches_the_orchestrator_actor_token() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let initiate = mock_initiate(&server, "orchestrator-flow").await;

	mock_authenticate(&server, ORCHESTRATOR_AGENT_ID, "orchestrator-actor-code").await;
	mock_code_grant(&server, "orchestrator-actor-code", "orchestrator-actor-token").await;

	let first = broker.initialize().await.expect("Initialization should succeed.");
	let second = broker.initialize().await.expect("Second initialization should hit the cache.");

	assert_eq!(first.expose(), "orchestrator-actor-token");
	assert_eq!(second.expose(), first.expose());
	initiate.assert_calls_async(1).await;
	assert!(broker.audit_log().is_empty());
}

#[tokio::test]
async fn initialize_fails_when_the_actor_flow_fails() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authorize");
			then.status(500).body("boom");
		})
		.await;

	let err = broker.initialize().await.expect_err("Initialization must fail.");

	assert!(matches!(err, Error::FlowInitiation { .. }));
}

#[tokio::test]
async fn delegation_end_to_end() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let session = broker.create_session().await.expect("Session should be created.");
	let scopes = ScopeSet::new(["hr:read"]).expect("Scopes should be valid.");
	let url = broker
		.get_authorization_url(&session.id, &scopes)
		.await
		.expect("Authorization URL should build.");
	let query = |key: &str| {
		url.query_pairs().find(|(name, _)| name == key).map(|(_, value)| value.into_owned())
	};

	assert_eq!(url.path(), "/oauth2/authorize");
	assert_eq!(query("code_challenge").as_deref(), Some(session.pkce.challenge()));
	assert_eq!(query("code_challenge_method").as_deref(), Some("S256"));
	assert_eq!(query("state").as_deref(), Some(session.id.as_ref()));
	assert_eq!(query("requested_actor").as_deref(), Some(ORCHESTRATOR_AGENT_ID));
	assert_eq!(query("client_id").as_deref(), Some(ORCHESTRATOR_CLIENT_ID));
	assert_eq!(query("scope").as_deref(), Some("hr:read openid profile"));

	mock_orchestrator_actor_flow(&server).await;

	let verifier = format!("code_verifier={}", session.pkce.verifier());
	let delegated = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=abc123")
				.body_includes(verifier)
				.body_includes("actor_token=orchestrator-actor-token")
				.body_includes(
					"actor_token_type=urn%3Aietf%3Aparams%3Aoauth%3Atoken-type%3Aaccess_token",
				);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(DELEGATED_JWT, 1800));
		})
		.await;
	let completed =
		broker.handle_callback("abc123", &session.id).await.expect("Callback should succeed.");

	delegated.assert_async().await;

	assert_eq!(completed.status(), SessionStatus::Delegated);
	assert_eq!(completed.user_subject.as_deref(), Some("alice"));
	assert_eq!(
		completed.delegated_token.as_ref().map(|token| token.expose()),
		Some(DELEGATED_JWT)
	);
	assert_eq!(
		broker
			.delegated_token(&session.id)
			.await
			.expect("Session should exist.")
			.map(|token| token.expose().to_owned())
			.as_deref(),
		Some(DELEGATED_JWT)
	);

	let entry = broker.audit_log().last().expect("Delegation should be audited.");

	assert_eq!(entry.operation, AuditOperation::DelegatedTokenObtained);
	assert!(entry.success);
	assert_eq!(entry.actor_subject, ORCHESTRATOR_AGENT_ID);
	assert_eq!(entry.user_subject.as_deref(), Some("alice"));
	assert_eq!(broker.audit_log().for_audience(DELEGATION_AUDIENCE).len(), 1);

	let err = broker
		.handle_callback("abc123", &session.id)
		.await
		.expect_err("A second callback must not overwrite the session.");

	assert!(matches!(err, Error::SessionAlreadyDelegated { .. }));
	assert_eq!(broker.audit_log().len(), 1);
	delegated.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callbacks_exchange_the_code_once() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let session = broker.create_session().await.expect("Session should be created.");

	mock_orchestrator_actor_flow(&server).await;

	let delegated = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("code=race-code");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(DELEGATED_JWT, 1800));
		})
		.await;
	let (first, second) = tokio::join!(
		broker.handle_callback("race-code", &session.id),
		broker.handle_callback("race-code", &session.id),
	);
	let outcomes = [first, second];

	assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
	assert!(
		outcomes
			.iter()
			.any(|outcome| matches!(outcome, Err(Error::SessionAlreadyDelegated { .. })))
	);
	assert_eq!(broker.audit_log().len(), 1);
	delegated.assert_calls_async(1).await;
}

#[tokio::test]
async fn store_failure_after_issuance_is_audited() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server)).with_session_store(Arc::new(UnwritableStore::default()));
	let session = broker.create_session().await.expect("Session should be created.");

	mock_orchestrator_actor_flow(&server).await;

	let delegated = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("code=abc123");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(DELEGATED_JWT, 1800));
		})
		.await;
	let err = broker
		.handle_callback("abc123", &session.id)
		.await
		.expect_err("An unwritable store must fail the callback.");

	assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
	delegated.assert_calls_async(1).await;

	let entry = broker.audit_log().last().expect("Issued token must be audited.");

	assert_eq!(broker.audit_log().len(), 1);
	assert_eq!(entry.operation, AuditOperation::DelegatedTokenObtained);
	assert!(!entry.success);
	assert!(entry.error.as_deref().is_some_and(|error| error.contains("disk full")));
	assert_eq!(entry.target_service(), Some(DELEGATION_AUDIENCE));
}

#[tokio::test]
async fn unknown_state_is_rejected_without_audit() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let token = server
		.mock_async(|when, then| {
			when.method(POST);
			then.status(200).body(token_body("unused", 600));
		})
		.await;

	for state in ["missing-session", ""] {
		let err = broker
			.handle_callback("abc123", state)
			.await
			.expect_err("Unknown state must be rejected.");

		assert!(matches!(err, Error::SessionNotFound { .. }));
	}

	assert!(broker.audit_log().is_empty());
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn rejected_code_exchange_leaves_the_session_pending() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let session = broker.create_session().await.expect("Session should be created.");

	mock_orchestrator_actor_flow(&server).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("code=expired-code");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"Authorization code expired"}"#);
		})
		.await;

	let err = broker
		.handle_callback("expired-code", &session.id)
		.await
		.expect_err("Rejected code must fail the callback.");

	assert!(matches!(err, Error::TokenExchange(_)));
	assert!(!err.is_transient());

	let stored = broker.session(&session.id).await.expect("Session should still exist.");

	assert_eq!(stored.status(), SessionStatus::AwaitingCallback);
	assert!(stored.delegated_token.is_none());

	let entry = broker.audit_log().last().expect("Failure should be audited.");

	assert!(!entry.success);
	assert_eq!(entry.operation, AuditOperation::DelegatedTokenObtained);
	assert!(entry.error.as_deref().is_some_and(|error| error.contains("invalid_grant")));
}

#[tokio::test]
async fn empty_scope_set_is_rejected_for_authorization_urls() {
	let server = MockServer::start_async().await;
	let broker = broker(config(&server));
	let session = broker.create_session().await.expect("Session should be created.");
	let scopes = ScopeSet::default();
	let err = broker
		.get_authorization_url(&session.id, &scopes)
		.await
		.expect_err("Empty scopes must be rejected.");

	assert!(matches!(err, Error::Config(_)));
}
