//! RFC 8693 token exchange.
//!
//! `oauth2` has no model for this grant, so the form is assembled here and sent through
//! the same [`TokenHttpClient`] seam as every other call.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenGrant, expiry_from},
	config::ClientCredentials,
	error::TokenEndpointError,
	flows::IdentityProviderClient,
	http::{self, ProviderReply, TokenHttpClient},
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::{ClientAuthMethod, GrantType, ProviderStrategy, TokenType},
};

const GRANT: GrantType = GrantType::TokenExchange;

/// Parameters of one exchange call.
#[derive(Clone, Copy, Debug)]
pub struct TokenExchangeRequest<'a> {
	/// Credential being downscoped.
	pub subject_token: &'a str,
	/// Type of `subject_token`.
	pub subject_token_type: TokenType,
	/// Proof of the acting agent's identity.
	pub actor_token: Option<&'a str>,
	/// Intended recipient service.
	pub audience: Option<&'a str>,
	/// Requested scopes; omitted from the form when empty.
	pub scope: Option<&'a ScopeSet>,
}
impl<'a> TokenExchangeRequest<'a> {
	/// Starts a request for an access-token `subject_token`.
	pub fn new(subject_token: &'a str) -> Self {
		Self {
			subject_token,
			subject_token_type: TokenType::AccessToken,
			actor_token: None,
			audience: None,
			scope: None,
		}
	}

	/// Attaches the acting agent's token.
	pub fn with_actor_token(mut self, actor_token: &'a str) -> Self {
		self.actor_token = Some(actor_token);

		self
	}

	/// Restricts the result to `audience`.
	pub fn with_audience(mut self, audience: &'a str) -> Self {
		self.audience = Some(audience);

		self
	}

	/// Restricts the result to `scope`.
	pub fn with_scope(mut self, scope: &'a ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}
}

#[derive(Deserialize)]
struct ExchangeResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<u64>,
	#[serde(default)]
	scope: Option<String>,
	#[serde(default)]
	issued_token_type: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges `request.subject_token` for a token limited to the requested audience and
	/// scopes, authenticating as `client`.
	pub async fn perform_token_exchange(
		&self,
		client: &ClientCredentials,
		request: TokenExchangeRequest<'_>,
	) -> Result<TokenGrant> {
		obs::observe(FlowKind::TokenExchange, "perform_token_exchange", async move {
			let (form, basic_auth) = self.exchange_form(client, &request);
			let http_request = http::form_request(
				&self.descriptor.endpoints.token,
				form.iter().map(|(key, value)| (key.as_str(), value.as_str())),
				basic_auth,
			)?;
			let reply = self.dispatch(http_request).await?;

			parse_exchange_reply(self.strategy.as_ref(), &reply)
		})
		.await
	}

	fn exchange_form(
		&self,
		client: &ClientCredentials,
		request: &TokenExchangeRequest<'_>,
	) -> (BTreeMap<String, String>, Option<String>) {
		let mut form = BTreeMap::new();

		form.insert("grant_type".to_owned(), GRANT.as_str().to_owned());
		form.insert("subject_token".to_owned(), request.subject_token.to_owned());
		form.insert("subject_token_type".to_owned(), request.subject_token_type.to_string());

		if let Some(actor_token) = request.actor_token {
			form.insert("actor_token".to_owned(), actor_token.to_owned());
			form.insert("actor_token_type".to_owned(), TokenType::AccessToken.to_string());
		}
		if let Some(audience) = request.audience {
			form.insert("audience".to_owned(), audience.to_owned());
		}
		if let Some(scope) =
			request.scope.and_then(|scope| scope.join(self.descriptor.quirks.scope_delimiter))
		{
			form.insert("scope".to_owned(), scope);
		}

		let basic_auth = match self.descriptor.client_auth_method {
			ClientAuthMethod::ClientSecretPost => {
				form.insert("client_id".to_owned(), client.client_id.clone());
				form.insert("client_secret".to_owned(), client.client_secret.expose().to_owned());

				None
			},
			ClientAuthMethod::ClientSecretBasic => Some(basic_authorization(client)),
		};

		self.strategy.augment_token_request(GRANT, &mut form);

		(form, basic_auth)
	}
}

fn basic_authorization(client: &ClientCredentials) -> String {
	let id = form_urlencoded::byte_serialize(client.client_id.as_bytes()).collect::<String>();
	let secret = form_urlencoded::byte_serialize(client.client_secret.expose().as_bytes())
		.collect::<String>();

	format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

fn parse_exchange_reply(
	strategy: &dyn ProviderStrategy,
	reply: &ProviderReply,
) -> Result<TokenGrant> {
	let status = Some(reply.status);

	if !reply.is_success() {
		return Err(match serde_json::from_slice::<ErrorResponse>(&reply.body) {
			Ok(body) => oauth::rejected(
				strategy,
				GRANT,
				status,
				body.error,
				body.error_description,
				None,
			),
			Err(_) => {
				let preview = reply.body_preview();

				oauth::rejected(
					strategy,
					GRANT,
					status,
					format!("http_{}", reply.status),
					Some(preview.clone()).filter(|preview| !preview.is_empty()),
					Some(preview),
				)
			},
		}
		.into());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&reply.body);
	let body = serde_path_to_error::deserialize::<_, ExchangeResponse>(&mut deserializer)
		.map_err(|source| TokenEndpointError::Malformed { grant: GRANT, status, source })?;

	if body.access_token.trim().is_empty() {
		return Err(TokenEndpointError::Unexpected {
			grant: GRANT,
			status,
			message: "access_token is empty".into(),
		}
		.into());
	}

	let scope = match body.scope.as_deref() {
		Some(raw) => ScopeSet::from_delimited(raw).map_err(|err| TokenEndpointError::Unexpected {
			grant: GRANT,
			status,
			message: format!("scope is invalid: {err}"),
		})?,
		None => ScopeSet::default(),
	};
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = expiry_from(GRANT, issued_at, body.expires_in)?;

	Ok(TokenGrant {
		access_token: body.access_token.as_str().into(),
		token_type: body.token_type.unwrap_or_else(|| "Bearer".into()),
		scope,
		issued_token_type: body.issued_token_type,
		issued_at,
		expires_at,
	})
}
