//! User authorization URL pre-bound to the orchestrator's actor identity.

// self
use crate::{
	_prelude::*,
	auth::{IDENTITY_SCOPES, PkceChallenge, ScopeSet, ScopeValidationError},
	error::ConfigError,
	flows::IdentityProviderClient,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Inputs for [`IdentityProviderClient::build_authorize_url`].
#[derive(Clone, Copy, Debug)]
pub struct AuthorizeRequest<'a> {
	/// Client the user authorizes (the orchestrator application).
	pub client_id: &'a str,
	/// Business scopes; identity scopes are appended automatically.
	pub scope: &'a ScopeSet,
	/// Opaque `state`, normally the session identifier.
	pub state: &'a str,
	/// PKCE pair of the session.
	pub pkce: &'a PkceChallenge,
	/// Agent identity the delegated token is bound to.
	pub requested_actor: &'a str,
}

impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorization-code request URL.
	///
	/// `openid` and `profile` are appended to the requested scopes, the PKCE challenge is
	/// attached with `S256`, and `requested_actor` names the orchestrator's agent identity.
	/// Fails only when no business scope was requested.
	pub fn build_authorize_url(&self, request: AuthorizeRequest<'_>) -> Result<Url> {
		if request.scope.is_empty() {
			return Err(ConfigError::from(ScopeValidationError::EmptySet).into());
		}

		let scope = request.scope.union(IDENTITY_SCOPES);
		let scope = scope.join(self.descriptor.quirks.scope_delimiter).unwrap_or_default();
		let mut url = self.descriptor.endpoints.authorization.clone();

		url.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("client_id", request.client_id)
			.append_pair("scope", &scope)
			.append_pair("redirect_uri", self.descriptor.redirect_uri.as_str())
			.append_pair("state", request.state)
			.append_pair("code_challenge", request.pkce.challenge())
			.append_pair("code_challenge_method", request.pkce.method().as_str())
			.append_pair("requested_actor", request.requested_actor);

		Ok(url)
	}
}
