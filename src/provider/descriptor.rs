//! What the broker needs to know about an identity provider tenant.

mod builder;
mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// `BasicAuthenticator:LOCAL`, base64 encoded, as the app-native authentication API expects.
pub const LOCAL_BASIC_AUTHENTICATOR_ID: &str = "QmFzaWNBdXRoZW50aWNhdG9yOkxPQ0FM";

/// How client credentials reach the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// `Authorization: Basic` header.
	ClientSecretBasic,
	/// `client_id` and `client_secret` form fields.
	#[default]
	ClientSecretPost,
}

/// Provider endpoint roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	/// User consent redirects and the first actor-flow step.
	Authorization,
	/// Second actor-flow step (credential submission).
	Authentication,
	/// Every grant.
	Token,
}
impl Endpoint {
	/// Every endpoint role.
	pub const ALL: [Self; 3] = [Self::Authorization, Self::Authentication, Self::Token];

	/// Path below the tenant base URL.
	pub const fn default_path(self) -> &'static str {
		match self {
			Self::Authorization => "oauth2/authorize",
			Self::Authentication => "oauth2/authn",
			Self::Token => "oauth2/token",
		}
	}

	/// Lowercase role name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Authorization => "authorization",
			Self::Authentication => "authentication",
			Self::Token => "token",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Endpoint URLs of one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint.
	pub authorization: Url,
	/// Authentication endpoint.
	pub authentication: Url,
	/// Token endpoint.
	pub token: Url,
}
impl ProviderEndpoints {
	/// URL serving `endpoint`.
	pub fn get(&self, endpoint: Endpoint) -> &Url {
		match endpoint {
			Endpoint::Authorization => &self.authorization,
			Endpoint::Authentication => &self.authentication,
			Endpoint::Token => &self.token,
		}
	}
}

/// Deviations between providers that flows have to honor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Authenticator picked in the actor flow's authenticate step.
	pub authenticator_id: String,
	/// Separator placed between scopes in `scope` parameters.
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { authenticator_id: LOCAL_BASIC_AUTHENTICATOR_ID.into(), scope_delimiter: ' ' }
	}
}

/// Validated provider metadata shared by every flow.
///
/// Values built through [`ProviderDescriptorBuilder`] are already validated. Deserialized
/// values are not, so configuration loading calls [`ProviderDescriptor::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider label.
	pub id: ProviderId,
	/// Tenant endpoints.
	pub endpoints: ProviderEndpoints,
	/// Redirect URI registered for the orchestrator and agent applications.
	pub redirect_uri: Url,
	/// Client authentication at the token endpoint.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
	/// Provider quirks.
	#[serde(default)]
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Starts a builder for `id`.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Checks that every endpoint uses HTTPS and the quirks are usable.
	pub fn validate(&self) -> Result<(), ProviderDescriptorError> {
		for endpoint in Endpoint::ALL {
			let url = self.endpoints.get(endpoint);

			if url.scheme() != "https" {
				return Err(ProviderDescriptorError::InsecureEndpoint {
					endpoint,
					url: url.to_string(),
				});
			}
		}

		let delimiter = self.quirks.scope_delimiter;

		if delimiter.is_control() {
			return Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter });
		}
		if self.quirks.authenticator_id.trim().is_empty() {
			return Err(ProviderDescriptorError::EmptyAuthenticatorId);
		}

		Ok(())
	}
}
