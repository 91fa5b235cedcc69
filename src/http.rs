//! Request/response models and the transport abstraction.
//!
//! [`ApiRequest`] is everything needed to send (and later replay) a call. The client turns it
//! into a [`DispatchRequest`] (absolute URL, final headers) and hands that to an
//! [`HttpTransport`]. Transports only report whether a response arrived; status classification
//! happens in the client.

// std
use std::time::Duration;
// self
use crate::{
	_prelude::*,
	error::{ErrorCode, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a fully-built request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of a client and by the refresh coordinator.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with whatever response the server produced (any status).
	///
	/// Only failures where no response was received may be reported as [`TransportError`].
	fn execute(&self, request: DispatchRequest) -> TransportFuture<'_>;
}

/// Description of a call that can be dispatched and replayed.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL, or an absolute URL.
	pub path: String,
	/// Caller-supplied headers. `Authorization` is overwritten by the pipeline.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	/// Overrides the client's default deadline for this call.
	pub timeout: Option<Duration>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request without body or extra headers.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: HeaderMap::new(),
			body: None,
			timeout: None,
			retried: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(|e| {
			NormalizedError::new(
				ErrorCode::UnknownError,
				format!("Request body could not be serialized: {e}"),
			)
		})?;

		self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Overrides the deadline for this call.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns `true` once the request has been routed through a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Flips the retried flag; returns `false` if it was already set.
	pub(crate) fn mark_retried(&mut self) -> bool {
		!std::mem::replace(&mut self.retried, true)
	}
}

/// Fully-resolved request handed to a transport.
#[derive(Clone, Debug)]
pub struct DispatchRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Final header set, including `Authorization` when a token was attached.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl DispatchRequest {
	/// Returns the bearer token carried by the request, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.headers
			.get(header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "))
	}
}

/// Response returned by a transport, regardless of status.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with an empty header map.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body as UTF-8 text (lossy).
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON into `T`, naming the failing field on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|e| {
			NormalizedError::new(
				ErrorCode::UnknownError,
				format!("Response body could not be decoded at `{}`: {}", e.path(), e.inner()),
			)
			.with_status(self.status.as_u16())
		})
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are followed according to the wrapped client's policy; the deadline is enforced by
/// the session client rather than by reqwest.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn send(&self, request: DispatchRequest) -> Result<ApiResponse, TransportError> {
		let target = request.url.to_string();
		let mut builder = self.0.request(request.method, request.url).headers(request.headers);

		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(|e| map_reqwest_error(&target, e))?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await.map_err(|e| map_reqwest_error(&target, e))?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: DispatchRequest) -> TransportFuture<'_> {
		Box::pin(self.send(request))
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(target: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		return TransportError::Timeout { target: target.into() };
	}
	if err.is_builder() {
		return TransportError::Build { target: target.into(), reason: err.to_string() };
	}

	TransportError::network(target, err)
}
