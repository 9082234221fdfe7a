//! Shared fixtures for integration tests: a mock identity provider descriptor, a broker
//! configuration pointing at it, and a transport that trusts `httpmock`'s certificate.

#![allow(dead_code)]

// crates.io
use httpmock::prelude::*;
use oauth2_delegation_broker::{
	auth::{AgentKey, ProviderId, ScopeSet},
	broker::TokenBroker,
	config::{AgentConfig, AgentCredentials, BrokerConfig, ClientCredentials, OrchestratorConfig},
	flows::IdentityProviderClient,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::ProviderDescriptor,
	reqwest::{Client, redirect::Policy},
	url::Url,
};

pub const ORCHESTRATOR_CLIENT_ID: &str = "orchestrator-app";
pub const ORCHESTRATOR_CLIENT_SECRET: &str = "orchestrator-secret";
pub const ORCHESTRATOR_AGENT_ID: &str = "orchestrator-agent-id";
pub const ORCHESTRATOR_AGENT_SECRET: &str = "orchestrator-agent-secret";
pub const EXCHANGER_CLIENT_ID: &str = "exchanger-app";
pub const EXCHANGER_CLIENT_SECRET: &str = "exchanger-secret";
pub const HR_AGENT_ID: &str = "hr-agent-id";
pub const HR_AGENT_SECRET: &str = "hr-agent-secret";

pub type MockBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Provider descriptor whose endpoints live on `server`.
pub fn descriptor(server: &MockServer) -> ProviderDescriptor {
	let provider_id = ProviderId::new("mock-idp").expect("Provider identifier should be valid.");

	ProviderDescriptor::builder(provider_id)
		.base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
		.redirect_uri(
			Url::parse("http://localhost:8000/callback").expect("Redirect URI should parse."),
		)
		.build()
		.expect("Mock descriptor should build.")
}

/// Configuration with one orchestrator, a token exchanger, and `hr_agent`.
pub fn config(server: &MockServer) -> BrokerConfig {
	let hr_key = AgentKey::new("hr_agent").expect("Agent key should be valid.");
	let hr_scopes = ScopeSet::new(["hr:read", "hr:write"]).expect("Agent scopes should be valid.");

	BrokerConfig::new(
		descriptor(server),
		OrchestratorConfig {
			client: ClientCredentials::new(ORCHESTRATOR_CLIENT_ID, ORCHESTRATOR_CLIENT_SECRET),
			agent: AgentCredentials::new(ORCHESTRATOR_AGENT_ID, ORCHESTRATOR_AGENT_SECRET),
		},
	)
	.with_token_exchanger(ClientCredentials::new(EXCHANGER_CLIENT_ID, EXCHANGER_CLIENT_SECRET))
	.with_agent(
		hr_key,
		AgentConfig { id: HR_AGENT_ID.into(), secret: HR_AGENT_SECRET.into(), scopes: hr_scopes },
	)
}

/// Reqwest transport that accepts the self-signed certificates produced by `httpmock` and
/// never follows redirects.
pub fn http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn identity_provider(
	server: &MockServer,
) -> IdentityProviderClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	IdentityProviderClient::with_http_client(
		descriptor(server),
		http_client(),
		ReqwestTransportErrorMapper,
	)
}

pub fn broker(config: BrokerConfig) -> MockBroker {
	TokenBroker::with_http_client(config, http_client(), ReqwestTransportErrorMapper)
		.expect("Broker configuration should be valid.")
}

/// Mocks the initiate step: `302` to a login page carrying `flowId`.
pub async fn mock_initiate<'a>(server: &'a MockServer, flow_id: &str) -> httpmock::Mock<'a> {
	let location = format!("{}/login?flowId={flow_id}", server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authorize").body_includes("scope=openid");
			then.status(302).header("location", location);
		})
		.await
}

/// Mocks the authenticate step for `username`, answering with `code` in a JSON body.
pub async fn mock_authenticate<'a>(
	server: &'a MockServer,
	username: &str,
	code: &str,
) -> httpmock::Mock<'a> {
	let body = serde_json::json!({ "code": code }).to_string();
	let username = format!("\"username\":\"{username}\"");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authn").body_includes(username);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Mocks an `authorization_code` grant for `code`, issuing `access_token`.
pub async fn mock_code_grant<'a>(
	server: &'a MockServer,
	code: &str,
	access_token: &str,
) -> httpmock::Mock<'a> {
	let body = token_body(access_token, 3600);
	let code = format!("code={code}");

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.body_includes("grant_type=authorization_code")
				.body_includes(code);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Standard token endpoint success document.
pub fn token_body(access_token: &str, expires_in: u64) -> String {
	serde_json::json!({
		"access_token": access_token,
		"token_type": "Bearer",
		"expires_in": expires_in,
	})
	.to_string()
}
