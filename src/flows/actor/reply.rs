//! Reply shapes of the actor flow's initiate and authenticate steps.
//!
//! Providers hand out the flow identifier and the authorization code in several places.
//! Each known place is one variant, and parsing is a pure function of the reply.

// self
use crate::{_prelude::*, http::ProviderReply};

/// Where the initiate step put the flow identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitiateReply {
	/// `302` whose `Location` query carries `flowId`.
	RedirectFlowId(String),
	/// `302` whose `Location` query carries `sessionDataKey`.
	RedirectSessionDataKey(String),
	/// JSON body with `flowId`.
	JsonFlowId(String),
	/// JSON body with `flow_id`.
	JsonSnakeCaseFlowId(String),
}
impl InitiateReply {
	/// Classifies `reply`, resolving relative redirects against `endpoint`.
	pub fn parse(reply: &ProviderReply, endpoint: &Url) -> Result<Self> {
		if reply.is_redirect() {
			let location = redirect_target(reply, endpoint)
				.ok_or_else(|| initiation_error("redirect carried no usable Location header"))?;

			if let Some(flow_id) = query_value(&location, "flowId") {
				return Ok(Self::RedirectFlowId(flow_id));
			}
			if let Some(key) = query_value(&location, "sessionDataKey") {
				return Ok(Self::RedirectSessionDataKey(key));
			}

			return Err(initiation_error("redirect carried neither flowId nor sessionDataKey"));
		}
		if !reply.is_success() {
			return Err(initiation_error(format!(
				"provider answered {} with `{}`",
				reply.status,
				reply.body_preview()
			)));
		}

		let body = serde_json::from_slice::<InitiateBody>(&reply.body)
			.map_err(|_| initiation_error("response body is not a JSON object"))?;

		if let Some(flow_id) = non_empty(body.flow_id_camel) {
			return Ok(Self::JsonFlowId(flow_id));
		}
		if let Some(flow_id) = non_empty(body.flow_id) {
			return Ok(Self::JsonSnakeCaseFlowId(flow_id));
		}

		Err(initiation_error("response body carried neither flowId nor flow_id"))
	}

	/// Flow identifier, whichever shape carried it.
	pub fn flow_id(&self) -> &str {
		match self {
			Self::RedirectFlowId(id)
			| Self::RedirectSessionDataKey(id)
			| Self::JsonFlowId(id)
			| Self::JsonSnakeCaseFlowId(id) => id,
		}
	}

	/// Consumes the reply, returning the flow identifier.
	pub fn into_flow_id(self) -> String {
		match self {
			Self::RedirectFlowId(id)
			| Self::RedirectSessionDataKey(id)
			| Self::JsonFlowId(id)
			| Self::JsonSnakeCaseFlowId(id) => id,
		}
	}
}

/// Where the authenticate step put the authorization code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthenticateReply {
	/// `302` whose `Location` query carries `code`.
	RedirectCode(String),
	/// JSON body with `code`.
	JsonCode(String),
	/// JSON body with `authorizationCode`.
	JsonAuthorizationCode(String),
	/// JSON body with a `redirectUrl` whose query carries `code`.
	JsonRedirectUrl(String),
}
impl AuthenticateReply {
	/// Classifies `reply`, resolving relative redirects against `endpoint`.
	pub fn parse(reply: &ProviderReply, endpoint: &Url) -> Result<Self> {
		let status = Some(reply.status);

		if reply.is_redirect() {
			let location = redirect_target(reply, endpoint).ok_or_else(|| {
				authentication_error(status, "redirect carried no usable Location header")
			})?;

			return query_value(&location, "code")
				.map(Self::RedirectCode)
				.ok_or_else(|| authentication_error(status, "redirect carried no code"));
		}
		if !reply.is_success() {
			return Err(authentication_error(status, reply.body_preview()));
		}

		let body = serde_json::from_slice::<AuthenticateBody>(&reply.body)
			.map_err(|_| authentication_error(status, "response body is not a JSON object"))?;

		if let Some(code) = non_empty(body.code) {
			return Ok(Self::JsonCode(code));
		}
		if let Some(code) = non_empty(body.authorization_code) {
			return Ok(Self::JsonAuthorizationCode(code));
		}
		if let Some(code) = non_empty(body.redirect_url)
			.and_then(|raw| endpoint.join(&raw).ok())
			.and_then(|url| query_value(&url, "code"))
		{
			return Ok(Self::JsonRedirectUrl(code));
		}

		Err(authentication_error(status, "response carried no authorization code"))
	}

	/// Authorization code, whichever shape carried it.
	pub fn code(&self) -> &str {
		match self {
			Self::RedirectCode(code)
			| Self::JsonCode(code)
			| Self::JsonAuthorizationCode(code)
			| Self::JsonRedirectUrl(code) => code,
		}
	}

	/// Consumes the reply, returning the authorization code.
	pub fn into_code(self) -> String {
		match self {
			Self::RedirectCode(code)
			| Self::JsonCode(code)
			| Self::JsonAuthorizationCode(code)
			| Self::JsonRedirectUrl(code) => code,
		}
	}
}

#[derive(Deserialize)]
struct InitiateBody {
	#[serde(rename = "flowId")]
	flow_id_camel: Option<String>,
	flow_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateBody {
	code: Option<String>,
	authorization_code: Option<String>,
	redirect_url: Option<String>,
}

fn redirect_target(reply: &ProviderReply, endpoint: &Url) -> Option<Url> {
	reply.location.as_deref().and_then(|location| endpoint.join(location).ok())
}

fn query_value(url: &Url, key: &str) -> Option<String> {
	url.query_pairs().find(|(name, _)| name == key).and_then(|(_, value)| {
		let value = value.into_owned();

		non_empty(Some(value))
	})
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}

fn initiation_error(reason: impl Into<String>) -> Error {
	Error::FlowInitiation { reason: reason.into() }
}

fn authentication_error(status: Option<u16>, reason: impl Into<String>) -> Error {
	Error::Authentication { status, reason: reason.into() }
}
