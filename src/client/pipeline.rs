//! Request pipeline stage: resolve the target and attach the bearer credential.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	error::TransportError,
	http::{ApiRequest, DispatchRequest},
	store::{CredentialKey, CredentialStore},
};

/// Turns [`ApiRequest`] values into transport-ready [`DispatchRequest`] values.
#[derive(Clone)]
pub struct RequestPipeline {
	config: Arc<ClientConfig>,
	store: Arc<dyn CredentialStore>,
}
impl RequestPipeline {
	/// Creates a pipeline resolving against `config` and reading tokens from `store`.
	pub fn new(config: Arc<ClientConfig>, store: Arc<dyn CredentialStore>) -> Self {
		Self { config, store }
	}

	/// Reads the current access token.
	///
	/// A store failure is treated like a missing token: the call goes out unauthenticated and
	/// the server's 401 flows through the normal classification path.
	pub async fn stored_token(&self) -> Option<AccessToken> {
		match self.store.get(CredentialKey::AccessToken).await {
			Ok(token) => token,
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %_e, "access token unreadable; sending without credentials");

				None
			},
		}
	}

	/// Builds the outgoing request, attaching `token` as a bearer credential when present.
	pub fn attach(
		&self,
		request: &ApiRequest,
		token: Option<&AccessToken>,
	) -> Result<DispatchRequest, TransportError> {
		let url = self.config.resolve(&request.path).map_err(|e| TransportError::Build {
			target: request.path.clone(),
			reason: e.to_string(),
		})?;
		let mut headers = request.headers.clone();

		headers.remove(header::AUTHORIZATION);

		if let Some(token) = token {
			let mut value =
				HeaderValue::from_str(&token.bearer()).map_err(|_| TransportError::Build {
					target: url.to_string(),
					reason: "access token is not a valid header value".into(),
				})?;

			value.set_sensitive(true);
			headers.insert(header::AUTHORIZATION, value);
		}

		Ok(DispatchRequest {
			method: request.method.clone(),
			url,
			headers,
			body: request.body.clone(),
		})
	}
}
impl Debug for RequestPipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline").field("base_url", &self.config.base_url).finish()
	}
}
