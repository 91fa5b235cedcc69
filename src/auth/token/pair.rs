//! Access/refresh pairs and the refresh endpoint's wire payloads.

// self
use crate::{
	_prelude::*,
	auth::token::secret::{AccessToken, RefreshToken, TokenSecret},
};

/// Access and refresh tokens that are always written to the store together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Bearer credential for API calls.
	pub access_token: AccessToken,
	/// Credential exchanged at the refresh endpoint.
	pub refresh_token: RefreshToken,
}
impl TokenPair {
	/// Builds a pair from raw strings.
	pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access), refresh_token: TokenSecret::new(refresh) }
	}
}
impl From<RefreshResponse> for TokenPair {
	fn from(response: RefreshResponse) -> Self {
		Self::new(response.access_token, response.refresh_token)
	}
}

/// JSON body posted to the refresh endpoint.
#[derive(Clone, Serialize)]
pub struct RefreshRequest<'a> {
	/// Refresh token being exchanged.
	pub refresh_token: &'a str,
}
impl Debug for RefreshRequest<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshRequest").field("refresh_token", &"***").finish()
	}
}

/// Successful refresh endpoint response.
#[derive(Clone, PartialEq, Deserialize)]
pub struct RefreshResponse {
	/// Newly issued access token.
	pub access_token: String,
	/// Rotated refresh token.
	pub refresh_token: String,
	/// Token type label, normally `bearer`; empty when the server omits it.
	#[serde(default)]
	pub token_type: String,
	/// Lifetime of the access token in seconds, when the server reports one.
	///
	/// Any JSON number is accepted, integral or not.
	#[serde(default)]
	pub expires_in: Option<f64>,
}
impl Debug for RefreshResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshResponse")
			.field("access_token", &"***")
			.field("refresh_token", &"***")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}
