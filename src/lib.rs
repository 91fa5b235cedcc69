//! Authenticated HTTP client that attaches bearer credentials, refreshes expired access tokens
//! exactly once per burst of failures, replays the failed calls, and ends the session cleanly
//! when the refresh itself is rejected.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod obs;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Re-exports and fixtures shared by unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{TokenPair, UnauthenticatedHandler},
		client::SessionClient,
		config::ClientConfig,
		http::HttpTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Counts how many times the hosting application was told the session ended.
	#[derive(Clone, Debug, Default)]
	pub struct SignOutCounter(Arc<std::sync::atomic::AtomicUsize>);
	impl SignOutCounter {
		/// Returns the number of recorded sign-out notifications.
		pub fn count(&self) -> usize {
			self.0.load(std::sync::atomic::Ordering::SeqCst)
		}
	}
	impl UnauthenticatedHandler for SignOutCounter {
		fn on_unauthenticated(&self) {
			self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		}
	}

	/// Builds a [`ClientConfig`] pointed at `base_url` with short timeouts suited to tests.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(Url::parse(base_url).expect("Test base URL should parse."))
			.request_timeout(std::time::Duration::from_secs(5))
			.refresh_timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Test client configuration should build.")
	}

	/// Seeds a memory store with the provided tokens (either may be absent).
	pub async fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryStore> {
		let store = Arc::new(MemoryStore::default());

		if let (Some(access), Some(refresh)) = (access, refresh) {
			store
				.replace(TokenPair::new(access, refresh))
				.await
				.expect("Seeding the memory store should succeed.");
		} else {
			use crate::{auth::TokenSecret, store::CredentialKey};

			if let Some(access) = access {
				store
					.set(CredentialKey::AccessToken, TokenSecret::new(access))
					.await
					.expect("Seeding the access token should succeed.");
			}
			if let Some(refresh) = refresh {
				store
					.set(CredentialKey::RefreshToken, TokenSecret::new(refresh))
					.await
					.expect("Seeding the refresh token should succeed.");
			}
		}

		store
	}

	/// Constructs a [`SessionClient`] over the given transport with a memory store and a
	/// sign-out counter wired in.
	pub fn build_test_client<T>(
		config: ClientConfig,
		transport: Arc<T>,
		store: Arc<MemoryStore>,
	) -> (SessionClient<T>, SignOutCounter)
	where
		T: HttpTransport,
	{
		let counter = SignOutCounter::default();
		let store: Arc<dyn CredentialStore> = store;
		let client = SessionClient::with_transport(config, store, transport, counter.clone())
			.expect("Test client should build.");

		(client, counter)
	}

	#[cfg(feature = "reqwest")]
	/// Reqwest-backed client for `httpmock` integration tests.
	pub fn build_reqwest_test_client(
		base_url: &str,
		store: Arc<MemoryStore>,
	) -> (SessionClient<crate::http::ReqwestTransport>, SignOutCounter) {
		build_test_client(
			test_config(base_url),
			Arc::new(crate::http::ReqwestTransport::default()),
			store,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{NormalizedError, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
