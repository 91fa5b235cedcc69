//! Error normalization.
//!
//! Every terminal failure leaves the client through one of these functions so callers only ever
//! see [`NormalizedError`]. The functions are pure: they never touch the credential store or the
//! refresh coordinator.

// self
use crate::{
	_prelude::*,
	error::{ErrorCode, TransportError},
	http::ApiResponse,
};

/// Error body emitted by the API on failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerErrorBody {
	/// Machine-readable error code chosen by the server.
	#[serde(default)]
	pub error_code: Option<String>,
	/// Human-readable message.
	#[serde(default)]
	pub message: Option<String>,
	/// Status echoed by the server.
	#[serde(default)]
	pub status: Option<u16>,
	/// Structured details (field errors, conflicting ids, ...).
	#[serde(default)]
	pub details: Option<serde_json::Value>,
	/// Framework-style `detail` payload used by some endpoints instead of `message`.
	#[serde(default)]
	pub detail: Option<serde_json::Value>,
}

/// Maps a failure where no response was received.
pub fn from_transport(err: &TransportError) -> NormalizedError {
	match err {
		TransportError::Timeout { .. } => NormalizedError::new(
			ErrorCode::NetworkError,
			"The request timed out before the server responded.",
		),
		TransportError::Network { .. } => NormalizedError::new(
			ErrorCode::NetworkError,
			format!("The server could not be reached: {err}"),
		),
		TransportError::Build { .. } =>
			NormalizedError::new(ErrorCode::UnknownError, err.to_string()),
	}
}

/// Maps a non-2xx response using its status and, when parseable, its error body.
pub fn from_response(response: &ApiResponse) -> NormalizedError {
	let status = response.status;
	let code = ErrorCode::from_status(status);
	let body = parse_error_body(response);
	let message = body
		.message
		.clone()
		.or_else(|| body.detail.as_ref().and_then(|detail| detail.as_str().map(str::to_owned)))
		.unwrap_or_else(|| default_message(status));
	let mut details = body.details.clone();

	// Non-string `detail` payloads (validation error lists) carry the useful information.
	if details.is_none() {
		details = body.detail.filter(|detail| !detail.is_string());
	}
	if let Some(server_code) = body.error_code {
		details = Some(match details {
			Some(serde_json::Value::Object(mut map)) => {
				map.entry("error_code").or_insert(serde_json::Value::String(server_code));

				serde_json::Value::Object(map)
			},
			Some(other) => serde_json::json!({ "error_code": server_code, "details": other }),
			None => serde_json::json!({ "error_code": server_code }),
		});
	}

	let mut err = NormalizedError::new(code, message).with_status(status.as_u16());

	err.details = details;

	err
}

/// Maps a failed refresh into the error every waiting caller receives.
///
/// Whatever went wrong (unreachable endpoint, rejected refresh token, missing refresh token,
/// malformed body), the session is over, so the code is always [`ErrorCode::AuthError`].
pub fn from_refresh_failure(cause: &NormalizedError) -> NormalizedError {
	let mut err = NormalizedError::new(
		ErrorCode::AuthError,
		format!("Session expired and could not be renewed: {}", cause.message),
	);

	err.http_status = cause.http_status;
	err.details = cause.details.clone();

	err
}

fn parse_error_body(response: &ApiResponse) -> ServerErrorBody {
	if response.body.is_empty() {
		return ServerErrorBody::default();
	}

	serde_json::from_slice(&response.body).unwrap_or_default()
}

fn default_message(status: StatusCode) -> String {
	match status.canonical_reason() {
		Some(reason) => format!("Request failed with status {} ({reason}).", status.as_u16()),
		None => format!("Request failed with status {}.", status.as_u16()),
	}
}
