//! Broker-level error types shared across flows, the actor cache, the session store, and the
//! broker facade.

// self
use crate::{
	_prelude::*,
	provider::{GrantType, ProviderErrorKind},
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Missing or invalid local configuration.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A token endpoint call did not yield a usable token.
	#[error(transparent)]
	TokenExchange(#[from] TokenEndpointError),

	/// The identity provider did not hand out a flow identifier when the actor flow started.
	#[error("Identity provider did not return a flow identifier: {reason}.")]
	FlowInitiation {
		/// Broker-supplied reason string.
		reason: String,
	},
	/// Agent credentials were rejected or the authentication reply carried no code.
	#[error("Agent authentication failed: {reason}.")]
	Authentication {
		/// HTTP status code, when the provider answered.
		status: Option<u16>,
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Exchange was requested for an agent key absent from configuration.
	#[error("Agent `{key}` is not configured.")]
	UnknownAgent {
		/// Requested agent key.
		key: String,
	},
	/// No session matches the supplied identifier or `state` value.
	#[error("Session `{id}` was not found.")]
	SessionNotFound {
		/// Requested session identifier.
		id: String,
	},
	/// A callback arrived for a session that already holds a delegated token.
	#[error("Session `{id}` already holds a delegated token.")]
	SessionAlreadyDelegated {
		/// Session identifier.
		id: String,
	},
}
impl Error {
	/// Returns `true` when the failure is temporary and the whole operation may be retried with
	/// backoff. Credential and authorization rejections are never transient.
	pub fn is_transient(&self) -> bool {
		match self {
			Error::Transport(_) => true,
			Error::TokenExchange(err) => err.is_transient(),
			_ => false,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// JSON request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestEncode(#[source] serde_json::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),

	/// A credential required by the broker is empty or absent.
	#[error("Required credential `{field}` is missing.")]
	MissingCredential {
		/// Dotted configuration path of the missing value.
		field: String,
	},
	/// Token exchange requires the dedicated token-exchanger client.
	#[error("Token exchange requires the token-exchanger client credentials.")]
	MissingTokenExchanger,
	/// Agent has no declared scopes and the fallback policy denies derivation.
	#[error("Agent `{key}` declares no scopes.")]
	MissingAgentScopes {
		/// Agent key.
		key: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be at least one second.")]
	InvalidTimeout,
	/// Configuration file could not be read.
	#[error("Configuration file `{path}` could not be read.")]
	Read {
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration document is invalid.")]
	Parse(#[from] toml::de::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Shorthand for [`ConfigError::MissingCredential`].
	pub fn missing(field: impl Into<String>) -> Self {
		Self::MissingCredential { field: field.into() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures (non-2xx replies and unusable success bodies).
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// Provider answered with an OAuth error document or a non-2xx status.
	#[error(
		"Token endpoint rejected the {grant} grant with `{code}`{}.",
		.description.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
	)]
	Rejected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider `error` code (or `http_<status>` when the body was not an OAuth error).
		code: String,
		/// Provider `error_description`, or a preview of a non-JSON body.
		description: Option<String>,
		/// Strategy classification of the failure.
		kind: ProviderErrorKind,
	},
	/// Token endpoint responded with a body that could not be parsed.
	#[error("Token endpoint returned malformed JSON for the {grant} grant.")]
	Malformed {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint reply could not be interpreted.
	#[error("Token endpoint returned an unexpected response for the {grant} grant: {message}.")]
	Unexpected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Broker-supplied message.
		message: String,
	},
	/// Token endpoint returned a non-positive or out-of-range `expires_in`.
	#[error("Token endpoint returned an invalid expires_in for the {grant} grant.")]
	InvalidExpiresIn {
		/// Grant that was attempted.
		grant: GrantType,
	},
}
impl TokenEndpointError {
	/// Grant associated with the failure.
	pub fn grant(&self) -> GrantType {
		match self {
			Self::Rejected { grant, .. }
			| Self::Malformed { grant, .. }
			| Self::Unexpected { grant, .. }
			| Self::InvalidExpiresIn { grant } => *grant,
		}
	}

	/// Provider `error` code when the endpoint returned one.
	pub fn code(&self) -> Option<&str> {
		match self {
			Self::Rejected { code, .. } => Some(code),
			_ => None,
		}
	}

	/// HTTP status code, when available.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::Malformed { status, .. }
			| Self::Unexpected { status, .. } => *status,
			Self::InvalidExpiresIn { .. } => None,
		}
	}

	/// Returns `true` if the failure is safe to retry.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Rejected { kind, .. } => matches!(kind, ProviderErrorKind::Transient),
			Self::Malformed { .. } | Self::Unexpected { .. } => true,
			Self::InvalidExpiresIn { .. } => false,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded the configured timeout.
	#[error("Request to the identity provider timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
	/// HTTP client reported a failure without a structured source.
	#[error("HTTP client error occurred while calling the identity provider: {message}.")]
	Client {
		/// Client-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
