//! Response classifier: decides whether a failed call may go through a token refresh.
//!
//! Only a 401 on a request that has not been replayed yet is recoverable. Routing a request to
//! the refresh coordinator flips its retried flag first, so a replay that fails with 401 again is
//! surfaced instead of looping.

// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse},
	store::{CredentialKey, CredentialStore},
};

/// What the client should do with a failed response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
	/// Join (or start) a refresh and replay the request with the new access token.
	Refresh,
	/// 401 with nothing to refresh with: end the session and surface the error.
	Terminate,
	/// Normalize and return the error to the caller.
	Surface,
}

/// Pure decision table.
pub fn disposition(status: StatusCode, retried: bool, refresh_available: bool) -> Disposition {
	match (status, retried, refresh_available) {
		(StatusCode::UNAUTHORIZED, false, true) => Disposition::Refresh,
		(StatusCode::UNAUTHORIZED, false, false) => Disposition::Terminate,
		_ => Disposition::Surface,
	}
}

/// Classifies `response` for `request`, reading the refresh token only when it matters.
///
/// Marks the request as retried when the result is [`Disposition::Refresh`].
pub async fn classify(
	request: &mut ApiRequest,
	response: &ApiResponse,
	store: &dyn CredentialStore,
) -> Disposition {
	if response.status != StatusCode::UNAUTHORIZED || request.is_retried() {
		return Disposition::Surface;
	}

	let refresh_available = matches!(store.get(CredentialKey::RefreshToken).await, Ok(Some(_)));
	let verdict = disposition(response.status, request.is_retried(), refresh_available);

	if verdict == Disposition::Refresh {
		request.mark_retried();
	}

	verdict
}
