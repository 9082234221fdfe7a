//! Identity Provider Client: a stateless protocol driver for every provider-facing call.
//!
//! [`IdentityProviderClient`] owns the transport, the error mapper, the provider descriptor,
//! and the strategy. Credentials are passed per call, so one client serves the orchestrator,
//! every sub-agent, and the token exchanger. Each operation lives in its own module:
//!
//! - [`authorize`]: user authorization URL carrying PKCE and `requested_actor`.
//! - [`actor`]: the three-step actor token flow (initiate, authenticate, exchange).
//! - [`delegation`]: the authorization-code exchange bound to an actor token.
//! - [`exchange`]: RFC 8693 token exchange.
//! - `client_credentials`: the app-only grant.

pub mod actor;
pub mod authorize;
pub mod delegation;
pub mod exchange;

mod client_credentials;

pub use actor::*;
pub use authorize::*;
pub use exchange::*;

// crates.io
use oauth2::{AsyncHttpClient, HttpRequest};
// self
use crate::{
	_prelude::*,
	config::ClientCredentials,
	http::{ProviderReply, ResponseMetadataSlot, TokenHttpClient},
	oauth::{StandardGrants, TransportErrorMapper},
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	http::{DEFAULT_REQUEST_TIMEOUT, ReqwestHttpClient},
	oauth::ReqwestTransportErrorMapper,
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestIdentityProviderClient =
	IdentityProviderClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Stateless driver for authorize, authenticate, and token endpoint calls.
#[derive(Clone)]
pub struct IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for request augmentation and error classification.
	pub strategy: Arc<dyn ProviderStrategy>,
}
impl<C, M> IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
		}
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Sends `request` through the transport and returns the raw reply without following
	/// redirects.
	pub(crate) async fn dispatch(&self, request: HttpRequest) -> Result<ProviderReply> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = handle
			.call(request)
			.await
			.map_err(|err| self.transport_mapper.map_transport_error(meta.take().as_ref(), err))?;

		Ok(ProviderReply::from(response))
	}

	/// `oauth2`-backed grants authenticated as `client`.
	pub(crate) fn grants<'a>(
		&'a self,
		client: &ClientCredentials,
	) -> Result<StandardGrants<'a, C, M>> {
		StandardGrants::new(
			&self.descriptor,
			client,
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			self.strategy.as_ref(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl IdentityProviderClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client with its own reqwest transport (no redirects, 30 second timeout).
	pub fn new(descriptor: ProviderDescriptor) -> Result<Self, ConfigError> {
		Self::with_timeout(descriptor, DEFAULT_REQUEST_TIMEOUT)
	}

	/// Creates a client with its own reqwest transport bounded by `timeout`.
	pub fn with_timeout(
		descriptor: ProviderDescriptor,
		timeout: std::time::Duration,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			descriptor,
			ReqwestHttpClient::new(timeout)?,
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> Debug for IdentityProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityProviderClient").field("descriptor", &self.descriptor).finish()
	}
}
