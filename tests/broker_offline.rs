//! Properties that must hold without touching the network, checked through a transport that
//! only counts calls.

mod common;

// std
use std::{
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use httpmock::prelude::*;
use oauth2_delegation_broker::{
	auth::{ScopeSet, SessionId},
	broker::TokenBroker,
	config::BrokerConfig,
	error::{ConfigError, Error, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
};
// self
use common::config;

#[derive(Clone, Default)]
struct CountingHttpClient {
	calls: Arc<AtomicUsize>,
}
impl CountingHttpClient {
	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenHttpClient for CountingHttpClient {
	type Handle = CountingHandle;
	type TransportError = std::io::Error;

	fn with_metadata(&self, _slot: ResponseMetadataSlot) -> Self::Handle {
		CountingHandle { calls: self.calls.clone() }
	}
}

struct CountingHandle {
	calls: Arc<AtomicUsize>,
}
impl<'c> AsyncHttpClient<'c> for CountingHandle {
	type Error = HttpClientError<std::io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, _request: HttpRequest) -> Self::Future {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Err(HttpClientError::Other("offline transport".into())) })
	}
}

struct OfflineMapper;
impl TransportErrorMapper<std::io::Error> for OfflineMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<std::io::Error>,
	) -> Error {
		TransportError::Client { message: error.to_string() }.into()
	}
}

type OfflineBroker = TokenBroker<CountingHttpClient, OfflineMapper>;

fn offline_broker(config: BrokerConfig) -> (OfflineBroker, CountingHttpClient) {
	let transport = CountingHttpClient::default();
	let broker = OfflineBroker::with_http_client(config, transport.clone(), OfflineMapper)
		.expect("Broker configuration should be valid.");

	(broker, transport)
}

fn hr_write() -> ScopeSet {
	ScopeSet::new(["hr:write"]).expect("Scopes should be valid.")
}

#[tokio::test]
async fn unknown_agent_fails_before_any_network_call() {
	let server = MockServer::start_async().await;
	let (broker, transport) = offline_broker(config(&server));
	let err = broker
		.exchange_token_for_agent("T1", "ghost_agent", "onboarding-api", &hr_write())
		.await
		.expect_err("Unknown agents must be rejected.");

	assert!(matches!(err, Error::UnknownAgent { ref key } if key == "ghost_agent"));
	assert_eq!(transport.calls(), 0);
	assert!(broker.audit_log().is_empty());
}

#[tokio::test]
async fn missing_exchanger_fails_before_any_network_call_and_is_audited() {
	let server = MockServer::start_async().await;
	let mut config = config(&server);

	config.token_exchanger = None;

	let (broker, transport) = offline_broker(config);
	let err = broker
		.exchange_token_for_agent("T1", "hr_agent", "onboarding-api", &hr_write())
		.await
		.expect_err("Exchange without an exchanger client must fail.");

	assert!(matches!(err, Error::Config(ConfigError::MissingTokenExchanger)));
	assert_eq!(transport.calls(), 0);

	let entry = broker.audit_log().last().expect("Failure should be audited.");

	assert_eq!(broker.audit_log().len(), 1);
	assert!(!entry.success);
}

#[tokio::test]
async fn transport_failures_are_transient_and_audited() {
	let server = MockServer::start_async().await;
	let (broker, transport) = offline_broker(config(&server));
	let err = broker
		.exchange_token_for_agent("T1", "hr_agent", "onboarding-api", &hr_write())
		.await
		.expect_err("Offline transport must fail the exchange.");

	assert!(matches!(err, Error::Transport(TransportError::Client { .. })));
	assert!(err.is_transient());
	assert_eq!(transport.calls(), 1);
	assert_eq!(broker.audit_log().len(), 1);
}

#[tokio::test]
async fn unknown_session_is_rejected_without_network() {
	let server = MockServer::start_async().await;
	let (broker, transport) = offline_broker(config(&server));

	assert!(matches!(
		broker.handle_callback("abc123", "no-such-session").await,
		Err(Error::SessionNotFound { .. })
	));
	let missing = SessionId::new("no-such-session").expect("Session id should be valid.");

	assert!(matches!(
		broker.get_authorization_url(&missing, &hr_write()).await,
		Err(Error::SessionNotFound { .. })
	));
	assert_eq!(transport.calls(), 0);
	assert!(broker.audit_log().is_empty());
}

#[test]
fn invalid_configuration_is_rejected_at_construction() {
	let server = MockServer::start();
	let mut config = config(&server);

	config.orchestrator.client.client_id = " ".into();

	let err = OfflineBroker::with_http_client(config, CountingHttpClient::default(), OfflineMapper)
		.expect_err("Blank credentials must be rejected.");

	assert!(matches!(
		err,
		ConfigError::MissingCredential { ref field } if field == "orchestrator.client.client_id"
	));
}
