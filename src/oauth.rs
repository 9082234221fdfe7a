//! Grants driven through the `oauth2` crate, and transport error mapping.
//!
//! `authorization_code` (with or without an actor token) and `client_credentials` use
//! `oauth2`'s request builders. RFC 8693 exchange has no `oauth2` model and is assembled in
//! [`crate::flows`], which reuses `rejected` so both paths classify failures identically.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenGrant, expiry_from},
	config::ClientCredentials,
	error::{ConfigError, TokenEndpointError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderStrategy,
		TokenType,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type GrantError<E> = BasicRequestTokenError<HttpClientError<E>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Client { message }.into(),
			_ => TransportError::Client { message: "unknown transport failure".into() }.into(),
		}
	}
}

/// Authorization-code redemption parameters.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CodeExchange<'a> {
	pub(crate) code: &'a str,
	pub(crate) pkce_verifier: &'a str,
	/// Attached as `actor_token` with the access-token type URN.
	pub(crate) actor_token: Option<&'a str>,
}

/// One client's view of the grants `oauth2` models natively.
pub(crate) struct StandardGrants<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: &'a C,
	error_mapper: &'a M,
	strategy: &'a dyn ProviderStrategy,
}
impl<'a, C, M> StandardGrants<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		descriptor: &ProviderDescriptor,
		client: &ClientCredentials,
		http_client: &'a C,
		error_mapper: &'a M,
		strategy: &'a dyn ProviderStrategy,
	) -> Result<Self> {
		let invalid = |source| ConfigError::InvalidDescriptor { source };
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string()).map_err(invalid)?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string()).map_err(invalid)?;
		let redirect_url = RedirectUrl::new(descriptor.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let auth_type = match descriptor.client_auth_method {
			ClientAuthMethod::ClientSecretBasic => AuthType::BasicAuth,
			ClientAuthMethod::ClientSecretPost => AuthType::RequestBody,
		};
		let oauth_client = BasicClient::new(ClientId::new(client.client_id.clone()))
			.set_client_secret(ClientSecret::new(client.client_secret.expose().to_owned()))
			.set_auth_type(auth_type)
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Ok(Self { oauth_client, http_client, error_mapper, strategy })
	}

	pub(crate) async fn authorization_code(
		&self,
		exchange: CodeExchange<'_>,
	) -> Result<TokenGrant> {
		const GRANT: GrantType = GrantType::AuthorizationCode;

		let mut extra = BTreeMap::new();

		if let Some(actor_token) = exchange.actor_token {
			extra.insert("actor_token".to_owned(), actor_token.to_owned());
			extra.insert("actor_token_type".to_owned(), TokenType::AccessToken.to_string());
		}

		self.strategy.augment_token_request(GRANT, &mut extra);

		let request = extra.iter().fold(
			self.oauth_client
				.exchange_code(AuthorizationCode::new(exchange.code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(exchange.pkce_verifier.to_owned())),
			|request, (key, value)| request.add_extra_param(key, value),
		);
		let slot = ResponseMetadataSlot::default();
		let outcome = request.request_async(&self.http_client.with_metadata(slot.clone())).await;

		self.settle(GRANT, &slot, outcome)
	}

	pub(crate) async fn client_credentials(&self, scope: &ScopeSet) -> Result<TokenGrant> {
		const GRANT: GrantType = GrantType::ClientCredentials;

		let mut extra = BTreeMap::new();

		self.strategy.augment_token_request(GRANT, &mut extra);

		let request = extra.iter().fold(
			self.oauth_client
				.exchange_client_credentials()
				.add_scopes(scope.iter().map(|value| Scope::new(value.to_owned()))),
			|request, (key, value)| request.add_extra_param(key, value),
		);
		let slot = ResponseMetadataSlot::default();
		let outcome = request.request_async(&self.http_client.with_metadata(slot.clone())).await;

		self.settle(GRANT, &slot, outcome)
	}

	fn settle(
		&self,
		grant: GrantType,
		slot: &ResponseMetadataSlot,
		outcome: Result<BasicTokenResponse, GrantError<C::TransportError>>,
	) -> Result<TokenGrant> {
		let meta = slot.take();
		let status = meta.as_ref().and_then(|meta| meta.status);
		let response = match outcome {
			Ok(response) => response,
			Err(RequestTokenError::ServerResponse(body)) => {
				let code = body.error().as_ref().to_owned();
				let description = body.error_description().cloned();

				return Err(rejected(self.strategy, grant, status, code, description, None).into());
			},
			Err(RequestTokenError::Request(err)) =>
				return Err(self.error_mapper.map_transport_error(meta.as_ref(), err)),
			Err(RequestTokenError::Parse(source, _)) =>
				return Err(TokenEndpointError::Malformed { grant, status, source }.into()),
			Err(RequestTokenError::Other(message)) =>
				return Err(TokenEndpointError::Unexpected { grant, status, message }.into()),
		};
		let issued_at = OffsetDateTime::now_utc();
		let expires_at =
			expiry_from(grant, issued_at, response.expires_in().map(|lifetime| lifetime.as_secs()))?;
		let scope = response
			.scopes()
			.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.as_str().to_owned())))
			.transpose()
			.map_err(|err| TokenEndpointError::Unexpected {
				grant,
				status,
				message: format!("scope is invalid: {err}"),
			})?
			.unwrap_or_default();

		Ok(TokenGrant {
			access_token: response.access_token().secret().as_str().into(),
			token_type: response.token_type().as_ref().to_owned(),
			scope,
			issued_token_type: None,
			issued_at,
			expires_at,
		})
	}
}

/// Classifies a token endpoint rejection through the provider strategy.
pub(crate) fn rejected(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	status: Option<u16>,
	code: String,
	description: Option<String>,
	body_preview: Option<String>,
) -> TokenEndpointError {
	let mut ctx = ProviderErrorContext::new(grant).with_oauth_error(code.clone());

	if let Some(description) = &description {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}
	if let Some(body) = body_preview {
		ctx = ctx.with_body_preview(body);
	}

	let kind = strategy.classify_token_error(&ctx);

	TokenEndpointError::Rejected { grant, status, code, description, kind }
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout.into();
	}

	TransportError::from(err).into()
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::ProviderId,
		http::{DEFAULT_REQUEST_TIMEOUT, ReqwestHttpClient},
		provider::{DefaultProviderStrategy, ProviderErrorKind},
	};

	fn descriptor(method: ClientAuthMethod) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new("test-provider").expect("Failed to construct provider identifier."),
		)
		.base_url(Url::parse("https://example.com").expect("Failed to parse base URL."))
		.redirect_uri(
			Url::parse("http://localhost:8000/callback").expect("Failed to parse redirect URI."),
		)
		.client_auth_method(method)
		.build()
		.expect("Failed to build provider descriptor.")
	}

	fn client() -> ClientCredentials {
		ClientCredentials { client_id: "client-id".into(), client_secret: "secret".into() }
	}

	#[test]
	fn grants_build_for_both_auth_methods() {
		let http = ReqwestHttpClient::new(DEFAULT_REQUEST_TIMEOUT).expect("Reqwest client should build.");

		for method in [ClientAuthMethod::ClientSecretPost, ClientAuthMethod::ClientSecretBasic] {
			let grants = StandardGrants::new(
				&descriptor(method),
				&client(),
				&http,
				&ReqwestTransportErrorMapper,
				&DefaultProviderStrategy,
			);

			assert!(grants.is_ok());
		}
	}

	#[test]
	fn rejected_errors_are_classified() {
		let err = rejected(
			&DefaultProviderStrategy,
			GrantType::AuthorizationCode,
			Some(400),
			"invalid_grant".into(),
			Some("Actor token is not valid.".into()),
			None,
		);

		assert!(matches!(
			err,
			TokenEndpointError::Rejected { kind: ProviderErrorKind::InvalidGrant, .. }
		));
		assert_eq!(err.status(), Some(400));
	}
}
