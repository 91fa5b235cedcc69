//! Demonstrates a session surviving access-token expiry against a mock API.
//!
//! 1. Seed a [`MemoryStore`] with an access token the API has already expired.
//! 2. Fire three calls at once; all are rejected with 401.
//! 3. Observe a single refresh call, the replayed calls succeeding, and the rotated pair in the
//!    store.
//! 4. Sign out and watch the handler fire.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use session_client::{
	auth::{TokenPair, UnauthenticatedHandler},
	client::SessionClient,
	config::ClientConfig,
	http::ReqwestTransport,
	store::{CredentialKey, CredentialStore, MemoryStore},
	url::Url,
};

#[derive(Debug, Deserialize)]
struct Class {
	id: u32,
	title: String,
}

struct PrintSignOut;
impl UnauthenticatedHandler for PrintSignOut {
	fn on_unauthenticated(&self) {
		println!("session ended; routing to the sign-in screen");
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/classes").header("authorization", "Bearer demo-expired");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error_code\":\"TOKEN_EXPIRED\",\"message\":\"Access token expired\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(150))
				.body("{\"access_token\":\"demo-fresh\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":900}");
		})
		.await;
	let classes = server
		.mock_async(|when, then| {
			when.method(GET).path("/classes").header("authorization", "Bearer demo-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":1,\"title\":\"Junior swim\"}");
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let config = ClientConfig::builder(Url::parse(&server.base_url())?).build()?;
	let client = <SessionClient<ReqwestTransport>>::new(config, store.clone(), PrintSignOut)?;

	client.establish_session(TokenPair::new("demo-expired", "demo-refresh-1")).await?;

	let (a, b, c) = tokio::join!(
		client.get::<Class>("/classes?term=1"),
		client.get::<Class>("/classes?term=2"),
		client.get::<Class>("/classes?term=3"),
	);

	for class in [a?, b?, c?] {
		println!("class {}: {}", class.id, class.title);
	}

	let metrics = client.coordinator().metrics();

	println!(
		"refresh attempts: {}, coalesced callers: {}, refresh calls on the wire: {}",
		metrics.attempts(),
		metrics.coalesced(),
		metrics.network_calls()
	);

	if let Some(refresh_token) = store.get(CredentialKey::RefreshToken).await? {
		println!("rotated refresh token: {}", refresh_token.expose());
	}

	expired.assert_calls_async(3).await;
	refresh.assert_calls_async(1).await;
	classes.assert_calls_async(3).await;

	client.sign_out().await;

	Ok(())
}
