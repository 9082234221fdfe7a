// self
use crate::_prelude::*;

/// Grants the broker sends to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// User consent redeemed with an actor token attached.
	AuthorizationCode,
	/// App-only token for the orchestrator client.
	ClientCredentials,
	/// RFC 8693 exchange of a delegated token for a sub-agent.
	TokenExchange,
}
impl GrantType {
	/// `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::ClientCredentials => "client_credentials",
			Self::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// RFC 8693 token type URNs for `subject_token_type` and `actor_token_type`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
	#[default]
	/// OAuth access token.
	AccessToken,
	/// Bare JWT.
	Jwt,
	/// OpenID Connect ID token.
	IdToken,
}
impl TokenType {
	/// URN form.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "urn:ietf:params:oauth:token-type:access_token",
			Self::Jwt => "urn:ietf:params:oauth:token-type:jwt",
			Self::IdToken => "urn:ietf:params:oauth:token-type:id_token",
		}
	}
}
impl Display for TokenType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
