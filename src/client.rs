//! Authenticated client facade.
//!
//! [`SessionClient`] owns the request pipeline, the refresh coordinator, and the session
//! terminator, and wires them into one send loop:
//!
//! 1. attach the stored access token and dispatch;
//! 2. on a 401 that may be recovered, obtain a token from the [`RefreshCoordinator`] and replay
//!    the request once;
//! 3. normalize anything else into a [`NormalizedError`].

pub mod classify;
pub mod pipeline;
pub mod refresh;

pub use classify::*;
pub use pipeline::*;
pub use refresh::*;

// std
use std::time::Duration;
// crates.io
use serde::de::DeserializeOwned;
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SessionTerminator, TokenPair, UnauthenticatedHandler},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{ApiRequest, ApiResponse, HttpTransport},
	normalize,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::{CredentialKey, CredentialStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// HTTP client that keeps a bearer session alive across access-token expiry.
///
/// Clones share the transport, credential store, and refresh coordinator, so concurrent calls
/// made through any clone are coalesced into a single refresh.
pub struct SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Transport used for API calls and the refresh call.
	pub transport: Arc<T>,
	store: Arc<dyn CredentialStore>,
	pipeline: RequestPipeline,
	coordinator: Arc<RefreshCoordinator<T>>,
	terminator: SessionTerminator,
}
impl<T> SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over a caller-provided transport.
	///
	/// `handler` is invoked once each time the session ends (refresh rejected, 401 with nothing
	/// to refresh with, or [`sign_out`](Self::sign_out)).
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
		handler: impl 'static + UnauthenticatedHandler,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let refresh_url = config.refresh_url()?;
		let refresh_timeout = config.refresh_timeout;
		let config = Arc::new(config);
		let transport = transport.into();
		let terminator = SessionTerminator::new(store.clone(), Arc::new(handler));
		let coordinator = RefreshCoordinator::new(
			transport.clone(),
			store.clone(),
			terminator.clone(),
			refresh_url,
			refresh_timeout,
		);

		Ok(Self {
			pipeline: RequestPipeline::new(config.clone(), store.clone()),
			config,
			transport,
			store,
			coordinator: Arc::new(coordinator),
			terminator,
		})
	}

	/// Sends `request`, refreshing and replaying it once if the access token has expired.
	///
	/// Resolves with the response for any 2xx status. Everything else resolves with a
	/// [`NormalizedError`]; a failed refresh always yields
	/// [`AuthError`](crate::error::ErrorCode::AuthError) after the session has been cleared.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "send");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.drive(request)).await;

		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);

		result
	}

	/// Sends `request` and decodes a 2xx JSON body into `R`.
	pub async fn send_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.send(request).await?.json()
	}

	/// `GET path`, decoding the JSON response.
	pub async fn get<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::get(path)).await
	}

	/// `POST path` with a JSON body, decoding the JSON response.
	pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::post(path).json(body)?).await
	}

	/// `PUT path` with a JSON body, decoding the JSON response.
	pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::put(path).json(body)?).await
	}

	/// `PATCH path` with a JSON body, decoding the JSON response.
	pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::patch(path).json(body)?).await
	}

	/// `DELETE path`, ignoring the response body.
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.send(ApiRequest::delete(path)).await.map(|_| ())
	}

	/// Stores the token pair issued by a sign-in so later calls are authenticated.
	pub async fn establish_session(&self, pair: TokenPair) -> Result<()> {
		self.store.replace(pair).await.map_err(Into::into)
	}

	/// Ends the session. Returns `false` if there was nothing to clear.
	pub async fn sign_out(&self) -> bool {
		self.terminator.terminate().await
	}

	/// Returns `true` while an access token is stored.
	pub async fn is_authenticated(&self) -> bool {
		matches!(self.store.get(CredentialKey::AccessToken).await, Ok(Some(_)))
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		&self.coordinator
	}

	async fn drive(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let deadline = deadline_after(request.timeout.unwrap_or(self.config.request_timeout));
		let mut token = self.pipeline.stored_token().await;

		loop {
			let response = self.dispatch(&request, token.as_ref(), deadline).await?;

			if response.is_success() {
				return Ok(response);
			}

			match classify(&mut request, &response, self.store.as_ref()).await {
				Disposition::Refresh => {
					#[cfg(feature = "tracing")]
					tracing::debug!(
						method = %request.method,
						path = %request.path,
						"access token rejected; waiting on refresh"
					);

					token = Some(self.coordinator.acquire(token.as_ref(), deadline).await?);
				},
				Disposition::Terminate => {
					self.terminator.terminate().await;

					return Err(normalize::from_response(&response));
				},
				Disposition::Surface => return Err(normalize::from_response(&response)),
			}
		}
	}

	async fn dispatch(
		&self,
		request: &ApiRequest,
		token: Option<&AccessToken>,
		deadline: Instant,
	) -> Result<ApiResponse> {
		let dispatch =
			self.pipeline.attach(request, token).map_err(|e| normalize::from_transport(&e))?;
		let target = dispatch.url.to_string();

		match tokio::time::timeout_at(deadline, self.transport.execute(dispatch)).await {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(e)) => Err(normalize::from_transport(&e)),
			Err(_) => Err(normalize::from_transport(&TransportError::Timeout { target })),
		}
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		handler: impl 'static + UnauthenticatedHandler,
	) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Self::with_transport(config, store, ReqwestTransport::with_client(client), handler)
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			store: self.store.clone(),
			pipeline: self.pipeline.clone(),
			coordinator: self.coordinator.clone(),
			terminator: self.terminator.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

/// Stand-in horizon for timeouts too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
	let now = Instant::now();

	now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}
