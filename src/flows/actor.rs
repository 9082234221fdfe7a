//! Three-step actor token flow.
//!
//! An agent proves its own identity by walking the provider's app-native login:
//!
//! 1. **Initiate**: form POST to the authorize endpoint with the client id, scope `openid`,
//!    and a fresh PKCE challenge; the provider returns a flow identifier.
//! 2. **Authenticate**: JSON POST to the authentication endpoint with the flow identifier and
//!    the agent's username/password under the local basic authenticator; the provider returns
//!    an authorization code.
//! 3. **Exchange**: `authorization_code` grant with the PKCE verifier; the access token is the
//!    agent's actor token.
//!
//! Any failing step aborts the acquisition. Nothing is retried here.

pub mod reply;

pub use reply::*;

// self
use crate::{
	_prelude::*,
	auth::{ActorToken, PkceChallenge},
	config::{AgentCredentials, ClientCredentials},
	flows::IdentityProviderClient,
	http::{self, TokenHttpClient},
	oauth::{CodeExchange, TransportErrorMapper},
	obs::{self, FlowKind, FlowSpan},
};

const KIND: FlowKind = FlowKind::ActorToken;

/// States of the actor flow. Each transition performs exactly one provider call.
#[derive(Debug)]
enum ActorFlowState {
	Initiate,
	Authenticate { flow_id: String },
	Exchange { code: String },
	Done(ActorToken),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatePayload<'a> {
	flow_id: &'a str,
	selected_authenticator: SelectedAuthenticator<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectedAuthenticator<'a> {
	authenticator_id: &'a str,
	params: AuthenticatorParams<'a>,
}

#[derive(Serialize)]
struct AuthenticatorParams<'a> {
	username: &'a str,
	password: &'a str,
}

impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Acquires an actor token for `agent`, authenticating the flow with `client`.
	pub async fn get_actor_token(
		&self,
		client: &ClientCredentials,
		agent: &AgentCredentials,
	) -> Result<ActorToken> {
		obs::observe(KIND, "get_actor_token", async move {
			let pkce = PkceChallenge::generate();
			let mut state = ActorFlowState::Initiate;

			loop {
				state = match state {
					ActorFlowState::Initiate => {
						let flow_id = FlowSpan::new(KIND, "initiate")
							.with_agent(&agent.id)
							.instrument(self.initiate_actor_flow(client, &pkce))
							.await?;

						ActorFlowState::Authenticate { flow_id }
					},
					ActorFlowState::Authenticate { flow_id } => {
						let code = FlowSpan::new(KIND, "authenticate")
							.with_agent(&agent.id)
							.instrument(self.authenticate_agent(&flow_id, agent))
							.await?;

						ActorFlowState::Exchange { code }
					},
					ActorFlowState::Exchange { code } => {
						let token = FlowSpan::new(KIND, "exchange")
							.with_agent(&agent.id)
							.instrument(self.exchange_actor_code(client, agent, &code, &pkce))
							.await?;

						ActorFlowState::Done(token)
					},
					ActorFlowState::Done(token) => {
						#[cfg(feature = "tracing")]
						tracing::info!(
							agent = %token.subject,
							expires_at = %token.expires_at,
							"Actor token acquired."
						);

						return Ok(token);
					},
				};
			}
		})
		.await
	}

	/// Initiate step: returns the flow identifier.
	pub async fn initiate_actor_flow(
		&self,
		client: &ClientCredentials,
		pkce: &PkceChallenge,
	) -> Result<String> {
		let endpoint = &self.descriptor.endpoints.authorization;
		let request = http::form_request(
			endpoint,
			[
				("response_type", "code"),
				("client_id", client.client_id.as_str()),
				("scope", "openid"),
				("redirect_uri", self.descriptor.redirect_uri.as_str()),
				("code_challenge", pkce.challenge()),
				("code_challenge_method", pkce.method().as_str()),
			],
			None,
		)?;
		let reply = self.dispatch(request).await?;

		Ok(InitiateReply::parse(&reply, endpoint)?.into_flow_id())
	}

	/// Authenticate step: returns the authorization code.
	pub async fn authenticate_agent(
		&self,
		flow_id: &str,
		agent: &AgentCredentials,
	) -> Result<String> {
		let endpoint = &self.descriptor.endpoints.authentication;
		let payload = AuthenticatePayload {
			flow_id,
			selected_authenticator: SelectedAuthenticator {
				authenticator_id: &self.descriptor.quirks.authenticator_id,
				params: AuthenticatorParams {
					username: &agent.id,
					password: agent.secret.expose(),
				},
			},
		};
		let request = http::json_request(endpoint, &payload)?;
		let reply = self.dispatch(request).await?;

		Ok(AuthenticateReply::parse(&reply, endpoint)?.into_code())
	}

	async fn exchange_actor_code(
		&self,
		client: &ClientCredentials,
		agent: &AgentCredentials,
		code: &str,
		pkce: &PkceChallenge,
	) -> Result<ActorToken> {
		let grant = self
			.grants(client)?
			.authorization_code(CodeExchange {
				code,
				pkce_verifier: pkce.verifier(),
				actor_token: None,
			})
			.await?;

		Ok(ActorToken {
			subject: agent.id.clone(),
			token: grant.access_token,
			expires_at: grant.expires_at,
		})
	}
}
