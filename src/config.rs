//! Client configuration and its validating builder.

// std
use std::time::Duration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable settings consumed by [`SessionClient`](crate::client::SessionClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL every request path is resolved against.
	pub base_url: Url,
	/// Path of the refresh endpoint, relative to `base_url`.
	pub refresh_path: String,
	/// Default deadline for a call, including any time spent waiting on a refresh.
	#[serde(with = "duration_secs")]
	pub request_timeout: Duration,
	/// Deadline for the refresh call itself.
	#[serde(with = "duration_secs")]
	pub refresh_timeout: Duration,
}
impl ClientConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";
	/// Default per-request deadline.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
	/// Default refresh-call deadline.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request path against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
		if path.starts_with("http://") || path.starts_with("https://") {
			return Url::parse(path);
		}

		let mut base = self.base_url.clone();

		// `Url::join` drops the last path segment unless the base ends with a slash.
		if !base.path().ends_with('/') {
			let with_slash = format!("{}/", base.path());

			base.set_path(&with_slash);
		}

		base.join(path.trim_start_matches('/'))
	}

	/// Returns the absolute refresh endpoint URL.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path).map_err(|source| ConfigError::InvalidRefreshPath {
			path: self.refresh_path.clone(),
			source,
		})
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.host().is_none() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { name: "request" });
		}
		if self.refresh_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { name: "refresh" });
		}

		self.refresh_url()?;

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Base URL for API calls.
	pub base_url: Url,
	/// Refresh endpoint path.
	pub refresh_path: String,
	/// Default per-request deadline.
	pub request_timeout: Duration,
	/// Refresh-call deadline.
	pub refresh_timeout: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the default per-request deadline.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the refresh-call deadline.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			request_timeout: self.request_timeout,
			refresh_timeout: self.refresh_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

mod duration_secs {
	// std
	use std::time::Duration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_f64(value.as_secs_f64())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = f64::deserialize(deserializer)?;

		Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse fixture URL.")
	}

	#[test]
	fn builder_applies_defaults() {
		let config = ClientConfig::builder(url("https://api.example.com/v1"))
			.build()
			.expect("Default configuration should validate.");

		assert_eq!(config.refresh_path, "/auth/refresh");
		assert_eq!(config.request_timeout, Duration::from_secs(30));
		assert_eq!(config.refresh_timeout, Duration::from_secs(15));
		assert_eq!(
			config.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"https://api.example.com/v1/auth/refresh"
		);
	}

	#[test]
	fn resolve_keeps_base_path_and_query() {
		let config = ClientConfig::builder(url("https://api.example.com/v1/"))
			.build()
			.expect("Configuration should validate.");

		assert_eq!(
			config.resolve("/children?page=2").expect("Path should resolve.").as_str(),
			"https://api.example.com/v1/children?page=2"
		);
		assert_eq!(
			config.resolve("https://cdn.example.com/gallery/1").expect("URL should parse.").as_str(),
			"https://cdn.example.com/gallery/1"
		);
	}

	#[test]
	fn builder_rejects_zero_timeouts_and_bad_base() {
		let err = ClientConfig::builder(url("https://api.example.com"))
			.request_timeout(Duration::ZERO)
			.build()
			.expect_err("Zero request timeout should be rejected.");

		assert!(matches!(err, ConfigError::ZeroTimeout { name: "request" }));

		let err = ClientConfig::builder(url("mailto:coach@example.com"))
			.build()
			.expect_err("Non-http base URL should be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
	}

	#[test]
	fn config_deserializes_from_json() {
		let config: ClientConfig = serde_json::from_str(
			r#"{
				"base_url": "http://localhost:8000/api",
				"refresh_path": "/auth/refresh",
				"request_timeout": 10,
				"refresh_timeout": 2.5
			}"#,
		)
		.expect("Configuration JSON should deserialize.");

		assert_eq!(config.request_timeout, Duration::from_secs(10));
		assert_eq!(config.refresh_timeout, Duration::from_millis(2500));
	}
}
