//! Walks the whole delegation lifecycle against an in-process mock identity provider: actor
//! token acquisition, user delegation bound to the orchestrator, and per-agent downscoping.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_delegation_broker::{
	auth::ScopeSet,
	broker::TokenBroker,
	config::BrokerConfig,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::{Client, redirect::Policy},
};

const TOKEN_JSON: &str = "application/json";

fn token_body(access_token: &str) -> String {
	format!("{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":900}}")
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let base = server.base_url();
	let config = BrokerConfig::from_toml_str(&format!(
		r#"
		[provider]
		id = "demo-idp"
		redirect_uri = "http://localhost:8000/callback"

		[provider.endpoints]
		authorization = "{base}/oauth2/authorize"
		authentication = "{base}/oauth2/authn"
		token = "{base}/oauth2/token"

		[orchestrator.client]
		client_id = "orchestrator-app"
		client_secret = "orchestrator-secret"

		[orchestrator.agent]
		id = "orchestrator-agent-id"
		secret = "orchestrator-agent-secret"

		[token_exchanger]
		client_id = "exchanger-app"
		client_secret = "exchanger-secret"

		[agents.hr_agent]
		id = "hr-agent-id"
		secret = "hr-agent-secret"
		scopes = ["hr:read", "hr:write"]
		"#
	))?;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authorize");
			then.status(302).header("location", format!("{base}/login?flowId=demo-flow"));
		})
		.await;

	let agents = [("orchestrator-agent-id", "orchestrator-code"), ("hr-agent-id", "hr-code")];

	for (agent, code) in agents {
		let username = format!("\"username\":\"{agent}\"");

		server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/authn").body_includes(username);
				then.status(200)
					.header("content-type", TOKEN_JSON)
					.body(format!("{{\"code\":\"{code}\"}}"));
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token").body_includes(format!("code={code}"));
				then.status(200)
					.header("content-type", TOKEN_JSON)
					.body(token_body(&format!("{agent}-actor-token")));
			})
			.await;
	}

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("code=user-consent");
			then.status(200).header("content-type", TOKEN_JSON).body(token_body("delegated-token"));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("subject_token=delegated-token");
			then.status(200).header("content-type", TOKEN_JSON).body(token_body("hr-scoped-token"));
		})
		.await;

	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(Policy::none())
			.build()?,
	);
	let broker = <TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>>::with_http_client(
		config,
		http_client,
		ReqwestTransportErrorMapper,
	)?;
	let actor = broker.initialize().await?;

	println!("Orchestrator actor token acquired for {}.", actor.subject);

	let session = broker.create_session().await?;
	let url = broker.get_authorization_url(&session.id, &ScopeSet::new(["hr:read"])?).await?;

	println!("Send the user to: {url}");

	let session = broker.handle_callback("user-consent", &session.id).await?;

	println!("Session {} is now {:?}.", session.id, session.status());

	let delegated = broker.delegated_token(&session.id).await?.ok_or_else(|| {
		color_eyre::eyre::eyre!("Session should hold a delegated token after the callback.")
	})?;
	let grant = broker
		.exchange_token_for_agent(
			delegated.expose(),
			"hr_agent",
			"onboarding-api",
			&ScopeSet::new(["hr:write"])?,
		)
		.await?;

	println!("HR agent token: {}.", grant.access_token.expose());

	for entry in broker.audit_log().entries() {
		println!("{}", serde_json::to_string(&entry)?);
	}

	Ok(())
}
