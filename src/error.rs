//! Caller-facing error taxonomy plus the configuration and transport failures that feed it.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`NormalizedError`] by default.
pub type Result<T, E = NormalizedError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Taxonomy code attached to every [`NormalizedError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
	/// No response was received (DNS, TCP, TLS, timeout, interrupted refresh).
	NetworkError,
	/// 401 without a recoverable refresh path, or the refresh itself failed.
	AuthError,
	/// 400 or 422.
	ValidationError,
	/// 403.
	ForbiddenError,
	/// 409.
	ConflictError,
	/// Any 5xx.
	ServerError,
	/// Everything else.
	UnknownError,
}
impl ErrorCode {
	/// Returns a stable label suitable for logs, metrics, and wire payloads.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorCode::NetworkError => "NetworkError",
			ErrorCode::AuthError => "AuthError",
			ErrorCode::ValidationError => "ValidationError",
			ErrorCode::ForbiddenError => "ForbiddenError",
			ErrorCode::ConflictError => "ConflictError",
			ErrorCode::ServerError => "ServerError",
			ErrorCode::UnknownError => "UnknownError",
		}
	}

	/// Maps an HTTP status onto the taxonomy.
	pub fn from_status(status: StatusCode) -> Self {
		match status.as_u16() {
			401 => ErrorCode::AuthError,
			400 | 422 => ErrorCode::ValidationError,
			403 => ErrorCode::ForbiddenError,
			409 => ErrorCode::ConflictError,
			500..=599 => ErrorCode::ServerError,
			_ => ErrorCode::UnknownError,
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Uniform error shape returned to every caller regardless of where the failure originated.
///
/// Values are cheap to clone so a single refresh failure can be fanned out to every queued
/// request unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ThisError)]
#[error("{code}: {message}")]
pub struct NormalizedError {
	/// Taxonomy code.
	pub code: ErrorCode,
	/// Human-readable message, preferably the server's own.
	pub message: String,
	/// HTTP status of the response that produced the error, if one was received.
	pub http_status: Option<u16>,
	/// Structured details forwarded from the server error body.
	pub details: Option<serde_json::Value>,
}
impl NormalizedError {
	/// Creates an error without status or details.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), http_status: None, details: None }
	}

	/// Attaches the HTTP status.
	pub fn with_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Attaches structured details.
	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);

		self
	}

	/// Returns `true` when the failure ended (or must end) the authenticated session.
	pub fn is_auth(&self) -> bool {
		self.code == ErrorCode::AuthError
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative request paths.
	#[error("Base URL `{url}` must be an http(s) URL with a host.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Refresh path cannot be joined onto the base URL.
	#[error("Refresh path `{path}` cannot be resolved against the base URL.")]
	InvalidRefreshPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A timeout was configured as zero.
	#[error("The {name} timeout must be greater than zero.")]
	ZeroTimeout {
		/// Which timeout failed validation.
		name: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures: no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{target}`.")]
	Network {
		/// URL the call was addressed to.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The call did not complete before its deadline.
	#[error("Request to `{target}` timed out.")]
	Timeout {
		/// URL the call was addressed to.
		target: String,
	},
	/// The request could not be assembled (bad header value, unparseable URL).
	#[error("Request to `{target}` could not be built: {reason}.")]
	Build {
		/// URL (or path) the call was addressed to.
		target: String,
		/// Why the request was rejected.
		reason: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target: target.into(), source: Box::new(src) }
	}

	/// Returns `true` when the failure was a deadline expiry.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
