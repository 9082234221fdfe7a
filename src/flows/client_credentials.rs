//! App-only `client_credentials` grant.
//!
//! The broker itself never needs an app-only token; the grant is exposed for collaborators
//! that call provider management APIs with the orchestrator's own application identity.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenGrant},
	config::ClientCredentials,
	flows::IdentityProviderClient,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
};

impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs the `client_credentials` grant for `client`, requesting `scope`.
	pub async fn client_credentials(
		&self,
		client: &ClientCredentials,
		scope: &ScopeSet,
	) -> Result<TokenGrant> {
		obs::observe(FlowKind::ClientCredentials, "client_credentials", async move {
			self.grants(client)?.client_credentials(scope).await
		})
		.await
	}
}
