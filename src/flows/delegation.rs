//! Authorization-code exchange bound to the orchestrator's actor token.

// self
use crate::{
	_prelude::*,
	auth::{ActorToken, TokenGrant},
	config::ClientCredentials,
	flows::IdentityProviderClient,
	http::TokenHttpClient,
	oauth::{CodeExchange, TransportErrorMapper},
	obs::{self, FlowKind},
};

impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the user's authorization `code` for a delegated token.
	///
	/// The grant carries `actor_token`/`actor_token_type` so the provider binds the delegation
	/// to the presented actor. Provider rejections surface as
	/// [`Error::TokenExchange`] with the provider's error code and description.
	pub async fn exchange_code_for_delegated_token(
		&self,
		client: &ClientCredentials,
		code: &str,
		pkce_verifier: &str,
		actor_token: &ActorToken,
	) -> Result<TokenGrant> {
		obs::observe(FlowKind::Delegation, "exchange_code", async move {
			self.grants(client)?
				.authorization_code(CodeExchange {
					code,
					pkce_verifier,
					actor_token: Some(actor_token.expose()),
				})
				.await
		})
		.await
	}
}
