//! Token strings that stay out of logs.

// self
use crate::_prelude::*;

/// Short-lived bearer credential attached to outgoing calls.
pub type AccessToken = TokenSecret;
/// Longer-lived credential exchanged for a new [`AccessToken`].
pub type RefreshToken = TokenSecret;

const MASK: &str = "***";

/// Access or refresh token.
///
/// `Debug` and `Display` print a mask; [`expose`](Self::expose) is the only way to the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value, for headers and request bodies only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({MASK})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(MASK)
	}
}
