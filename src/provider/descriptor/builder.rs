// std
use std::collections::BTreeMap;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, Endpoint, ProviderDescriptor, ProviderEndpoints, ProviderQuirks},
};

/// Reasons a descriptor is unusable.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Neither an explicit URL nor a base URL covers the endpoint.
	#[error("The {endpoint} endpoint is not configured.")]
	MissingEndpoint {
		/// Affected endpoint.
		endpoint: Endpoint,
	},
	/// No redirect URI was given.
	#[error("Missing redirect URI.")]
	MissingRedirectUri,
	/// Appending a default path to the base URL produced an invalid URL.
	#[error("Cannot derive endpoints from base URL `{base}`.")]
	InvalidBaseUrl {
		/// Base URL as given.
		base: String,
	},
	/// Endpoint does not use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Affected endpoint.
		endpoint: Endpoint,
		/// Offending URL.
		url: String,
	},
	/// Scope delimiter is a control character.
	#[error("Scope delimiter {delimiter:?} is not printable.")]
	InvalidScopeDelimiter {
		/// Supplied delimiter.
		delimiter: char,
	},
	/// Authenticator id is blank.
	#[error("Authenticator identifier cannot be empty.")]
	EmptyAuthenticatorId,
}

/// Assembles a [`ProviderDescriptor`].
///
/// Endpoints that are not set explicitly are derived from the tenant base URL using
/// [`Endpoint::default_path`].
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	base_url: Option<Url>,
	explicit: BTreeMap<Endpoint, Url>,
	redirect_uri: Option<Url>,
	client_auth_method: ClientAuthMethod,
	quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Empty builder for `id`.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			base_url: None,
			explicit: BTreeMap::new(),
			redirect_uri: None,
			client_auth_method: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Tenant base URL such as `https://api.asgardeo.io/t/acme`.
	pub fn base_url(self, url: Url) -> Self {
		Self { base_url: Some(url), ..self }
	}

	/// Pins `endpoint` to `url`, overriding the base URL derivation.
	pub fn endpoint(mut self, endpoint: Endpoint, url: Url) -> Self {
		self.explicit.insert(endpoint, url);

		self
	}

	/// Pins the authorization endpoint.
	pub fn authorization_endpoint(self, url: Url) -> Self {
		self.endpoint(Endpoint::Authorization, url)
	}

	/// Pins the authentication endpoint.
	pub fn authentication_endpoint(self, url: Url) -> Self {
		self.endpoint(Endpoint::Authentication, url)
	}

	/// Pins the token endpoint.
	pub fn token_endpoint(self, url: Url) -> Self {
		self.endpoint(Endpoint::Token, url)
	}

	/// Sets the registered redirect URI.
	pub fn redirect_uri(self, url: Url) -> Self {
		Self { redirect_uri: Some(url), ..self }
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(self, method: ClientAuthMethod) -> Self {
		Self { client_auth_method: method, ..self }
	}

	/// Overrides the provider quirks.
	pub fn quirks(self, quirks: ProviderQuirks) -> Self {
		Self { quirks, ..self }
	}

	/// Resolves every endpoint and validates the result.
	pub fn build(mut self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let mut resolve = |endpoint| match self.explicit.remove(&endpoint) {
			Some(url) => Ok(url),
			None => derive(self.base_url.as_ref(), endpoint),
		};
		let endpoints = ProviderEndpoints {
			authorization: resolve(Endpoint::Authorization)?,
			authentication: resolve(Endpoint::Authentication)?,
			token: resolve(Endpoint::Token)?,
		};
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints,
			redirect_uri: self.redirect_uri.ok_or(ProviderDescriptorError::MissingRedirectUri)?,
			client_auth_method: self.client_auth_method,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

fn derive(base: Option<&Url>, endpoint: Endpoint) -> Result<Url, ProviderDescriptorError> {
	let base = base.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint })?;

	Url::parse(&format!("{}/{}", base.as_str().trim_end_matches('/'), endpoint.default_path()))
		.map_err(|_| ProviderDescriptorError::InvalidBaseUrl { base: base.to_string() })
}
