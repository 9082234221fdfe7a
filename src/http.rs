//! HTTP seam between the broker and its identity provider.
//!
//! Flows never talk to an HTTP stack directly. They ask a [`TokenHttpClient`] for a
//! per-request [`AsyncHttpClient`] handle bound to a [`ResponseMetadataSlot`]; the handle
//! records the status it saw so error mapping can report it even when the body is useless.
//!
//! Handles must hand `3xx` replies back untouched. The actor flow reads its flow id and
//! authorization code from `Location` headers.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION},
	},
};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError, provider::strategy::preview};

/// Per-request timeout used when the configuration does not set one.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Source of HTTP handles for provider calls.
///
/// Implementors are shared by every flow of a broker, so they must be `Send + Sync + 'static`.
/// Handle futures must be `Send` as well.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error raised by the underlying stack.
	type TransportError: 'static + Send + Sync + StdError;

	/// Handle returned by [`TokenHttpClient::with_metadata`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle that reports into `slot`.
	///
	/// A handle clears `slot` before sending and stores the status as soon as one is known.
	/// It must not follow redirects.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// What a handle observed about the last response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status, absent when the request never got a response.
	pub status: Option<u16>,
}

/// Shared cell a handle writes [`ResponseMetadata`] into.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the stored metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		self.0.lock().replace(meta);
	}

	/// Removes and returns the stored metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Status, redirect target, and body of a provider reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderReply {
	/// HTTP status code.
	pub status: u16,
	/// `Location` header, when present.
	pub location: Option<String>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ProviderReply {
	/// Creates a reply from its parts.
	pub fn new(status: u16, location: Option<String>, body: impl Into<Vec<u8>>) -> Self {
		Self { status, location, body: body.into() }
	}

	/// `2xx`.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// `3xx`.
	pub fn is_redirect(&self) -> bool {
		(300..400).contains(&self.status)
	}

	/// Lossy, truncated rendering of the body for error messages.
	pub fn body_preview(&self) -> String {
		preview(String::from_utf8_lossy(&self.body).into_owned())
	}
}
impl From<HttpResponse> for ProviderReply {
	fn from(response: HttpResponse) -> Self {
		let status = response.status().as_u16();
		let location = response
			.headers()
			.get(LOCATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);

		Self { status, location, body: response.into_body() }
	}
}

/// Builds a form-encoded POST, optionally carrying an HTTP Basic `Authorization` header.
pub(crate) fn form_request<'a, I>(
	url: &Url,
	pairs: I,
	basic_auth: Option<String>,
) -> Result<HttpRequest, ConfigError>
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();
	let mut builder = Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE);

	if let Some(value) = basic_auth {
		builder = builder.header(AUTHORIZATION, value);
	}

	Ok(builder.body(body.into_bytes())?)
}

/// Builds a JSON POST.
pub(crate) fn json_request<T>(url: &Url, payload: &T) -> Result<HttpRequest, ConfigError>
where
	T: ?Sized + Serialize,
{
	let body = serde_json::to_vec(payload).map_err(ConfigError::RequestEncode)?;

	Ok(Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(body)?)
}

/// reqwest-backed [`TokenHttpClient`].
///
/// A client supplied through [`ReqwestHttpClient::with_client`] must be built with
/// `redirect(Policy::none())`.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Redirect-free client bounding each request by `timeout`.
	pub fn new(timeout: StdDuration) -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().redirect(Policy::none()).timeout(timeout).build()?))
	}

	/// Uses `client` as is.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Handle produced by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl ReqwestHandle {
	async fn send(
		client: ReqwestClient,
		slot: ResponseMetadataSlot,
		request: HttpRequest,
	) -> Result<HttpResponse, HttpClientError<ReqwestError>> {
		slot.take();

		let request = request.try_into().map_err(Box::new)?;
		let response = client.execute(request).await.map_err(Box::new)?;
		let status = response.status();

		slot.store(ResponseMetadata { status: Some(status.as_u16()) });

		let headers = response.headers().clone();
		let body = response.bytes().await.map_err(Box::new)?;
		let mut reply = HttpResponse::new(body.to_vec());

		*reply.status_mut() = status;
		*reply.headers_mut() = headers;

		Ok(reply)
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(Self::send(self.client.clone(), self.slot.clone(), request))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Response, StatusCode};
	// self
	use super::*;

	#[test]
	fn form_request_encodes_pairs_and_headers() {
		let url = Url::parse("https://idp.example.com/oauth2/token")
			.expect("Token URL fixture should parse.");
		let request = form_request(
			&url,
			[("grant_type", "authorization_code"), ("scope", "hr:read hr:write")],
			Some("Basic abc".into()),
		)
		.expect("Form request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.headers()[CONTENT_TYPE], FORM_CONTENT_TYPE);
		assert_eq!(request.headers()[AUTHORIZATION], "Basic abc");
		assert_eq!(
			String::from_utf8_lossy(request.body()),
			"grant_type=authorization_code&scope=hr%3Aread+hr%3Awrite"
		);
	}

	#[test]
	fn reply_captures_location_and_status_classes() {
		let mut response: HttpResponse = Response::new(Vec::new());

		*response.status_mut() = StatusCode::FOUND;
		response.headers_mut().insert(
			LOCATION,
			"https://app.example.com/cb?code=xyz".parse().expect("Header value should parse."),
		);

		let reply = ProviderReply::from(response);

		assert!(reply.is_redirect());
		assert!(!reply.is_success());
		assert_eq!(reply.location.as_deref(), Some("https://app.example.com/cb?code=xyz"));
	}
}
