//! Credential store contract and the built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken, TokenPair, TokenSecret},
	error::ErrorCode,
};

/// Boxed future returned by every [`CredentialStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// The two keys a credential store persists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
	/// Bearer credential attached to API calls.
	AccessToken,
	/// Credential exchanged at the refresh endpoint.
	RefreshToken,
}
impl CredentialKey {
	/// Returns the storage key label.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKey::AccessToken => "access_token",
			CredentialKey::RefreshToken => "refresh_token",
		}
	}
}

/// Both credentials read under a single lock.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Current access token, if any.
	pub access_token: Option<AccessToken>,
	/// Current refresh token, if any.
	pub refresh_token: Option<RefreshToken>,
}
impl Credentials {
	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Returns the slot for `key`.
	pub fn get(&self, key: CredentialKey) -> Option<&TokenSecret> {
		match key {
			CredentialKey::AccessToken => self.access_token.as_ref(),
			CredentialKey::RefreshToken => self.refresh_token.as_ref(),
		}
	}

	pub(crate) fn set(&mut self, key: CredentialKey, value: TokenSecret) {
		match key {
			CredentialKey::AccessToken => self.access_token = Some(value),
			CredentialKey::RefreshToken => self.refresh_token = Some(value),
		}
	}
}
impl From<TokenPair> for Credentials {
	fn from(pair: TokenPair) -> Self {
		Self { access_token: Some(pair.access_token), refresh_token: Some(pair.refresh_token) }
	}
}

/// Storage backend holding the session's access and refresh tokens.
///
/// The store is the single source of truth for token values. [`replace`](Self::replace) and
/// [`load`](Self::load) must be atomic across both keys so no reader ever observes a new access
/// token next to an old refresh token (or the reverse).
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads one credential.
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Writes one credential.
	fn set(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()>;

	/// Replaces both credentials in one atomic step.
	fn replace(&self, pair: TokenPair) -> StoreFuture<'_, ()>;

	/// Reads both credentials in one atomic step.
	fn load(&self) -> StoreFuture<'_, Credentials>;

	/// Removes both credentials.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl From<StoreError> for NormalizedError {
	fn from(e: StoreError) -> Self {
		NormalizedError::new(ErrorCode::UnknownError, format!("Credential store failed: {e}"))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_normalized_error() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let normalized: NormalizedError = store_error.into();

		assert_eq!(normalized.code, ErrorCode::UnknownError);
		assert!(normalized.message.contains("disk unavailable"));
		assert_eq!(normalized.http_status, None);
	}

	#[test]
	fn credentials_track_both_slots() {
		let mut credentials = Credentials::default();

		assert!(credentials.is_empty());

		credentials.set(CredentialKey::RefreshToken, TokenSecret::new("rt"));

		assert!(!credentials.is_empty());
		assert_eq!(credentials.get(CredentialKey::AccessToken), None);
		assert_eq!(
			credentials.get(CredentialKey::RefreshToken).map(TokenSecret::expose),
			Some("rt")
		);
	}

	#[test]
	fn credential_key_serializes_as_snake_case() {
		let payload = serde_json::to_string(&CredentialKey::AccessToken)
			.expect("CredentialKey should serialize to JSON.");

		assert_eq!(payload, "\"access_token\"");
		assert_eq!(CredentialKey::RefreshToken.as_str(), "refresh_token");
	}
}
