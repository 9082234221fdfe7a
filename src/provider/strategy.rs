//! Per-provider hooks for token requests and error classification.

// std
use std::collections::BTreeMap;
// self
use crate::{_prelude::*, provider::descriptor::GrantType};

const PREVIEW_CHARS: usize = 256;
/// OAuth error codes the broker recognises, in lookup order.
const KNOWN_CODES: [(&str, ProviderErrorKind); 11] = [
	("invalid_grant", ProviderErrorKind::InvalidGrant),
	("access_denied", ProviderErrorKind::InvalidGrant),
	("invalid_request", ProviderErrorKind::InvalidGrant),
	("invalid_client", ProviderErrorKind::InvalidClient),
	("unauthorized_client", ProviderErrorKind::InvalidClient),
	("invalid_target", ProviderErrorKind::InsufficientScope),
	("invalid_scope", ProviderErrorKind::InsufficientScope),
	("insufficient_scope", ProviderErrorKind::InsufficientScope),
	("temporarily_unavailable", ProviderErrorKind::Transient),
	("server_error", ProviderErrorKind::Transient),
	("slow_down", ProviderErrorKind::Transient),
];

/// Hooks a provider integration can override.
///
/// Flows call these with crate-owned data only, so a strategy never sees the HTTP client.
pub trait ProviderStrategy: Send + Sync {
	/// Decides which [`ProviderErrorKind`] a failed token request falls into.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific form fields to an outgoing token request.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Coarse category of a token endpoint failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
	/// The code, subject token, or actor token was refused.
	InvalidGrant,
	/// The client could not authenticate.
	InvalidClient,
	/// The audience or scopes exceed the caller's entitlement.
	InsufficientScope,
	/// Retrying later may succeed.
	Transient,
}

/// What the broker knows about a failed token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant of the failing request.
	pub grant_type: GrantType,
	/// HTTP status.
	pub http_status: Option<u16>,
	/// OAuth `error`.
	pub oauth_error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
	/// Leading part of a non-JSON body.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	/// Starts an empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Sets the HTTP status.
	pub fn with_http_status(self, status: u16) -> Self {
		Self { http_status: Some(status), ..self }
	}

	/// Sets the OAuth `error` code.
	pub fn with_oauth_error(self, error: impl Into<String>) -> Self {
		Self { oauth_error: Some(error.into()), ..self }
	}

	/// Sets the OAuth `error_description`.
	pub fn with_error_description(self, description: impl Into<String>) -> Self {
		Self { error_description: Some(description.into()), ..self }
	}

	/// Sets the body preview, shortening it when needed.
	pub fn with_body_preview(self, body: impl Into<String>) -> Self {
		Self { body_preview: Some(preview(body.into())), ..self }
	}
}

/// Classification used when no provider-specific strategy is configured.
///
/// Lookup order: exact `error` code, then a known code mentioned anywhere in the description
/// or body, then the HTTP status.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		let exact = [ctx.oauth_error.as_deref(), ctx.error_description.as_deref()]
			.into_iter()
			.flatten()
			.find_map(|value| {
				KNOWN_CODES
					.iter()
					.find(|(code, _)| value.trim().eq_ignore_ascii_case(code))
					.map(|(_, kind)| *kind)
			});

		exact
			.or_else(|| mentioned_code(ctx.error_description.as_deref()))
			.or_else(|| mentioned_code(ctx.body_preview.as_deref()))
			.unwrap_or_else(|| by_status(ctx.http_status))
	}
}

/// Shortens `body` to the preview length, marking the cut with an ellipsis.
pub(crate) fn preview(body: String) -> String {
	match body.char_indices().nth(PREVIEW_CHARS) {
		Some((cut, _)) => format!("{}…", &body[..cut]),
		None => body,
	}
}

fn mentioned_code(text: Option<&str>) -> Option<ProviderErrorKind> {
	let text = text?.to_ascii_lowercase();

	KNOWN_CODES.iter().find(|(code, _)| text.contains(code)).map(|(_, kind)| *kind)
}

fn by_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}
