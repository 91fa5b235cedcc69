#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use session_client::{
	_preludet::*,
	auth::{AccessToken, RefreshToken, TokenPair},
	client::SessionClient,
	error::ErrorCode,
	http::{ApiRequest, ReqwestTransport},
	store::{CredentialKey, CredentialStore},
};

const REFRESHED_BODY: &str = "{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-new\",\"token_type\":\"bearer\",\"expires_in\":900}";

#[derive(Debug, serde::Deserialize)]
struct Profile {
	name: String,
}

async fn stored(store: &dyn CredentialStore, key: CredentialKey) -> Option<String> {
	store
		.get(key)
		.await
		.expect("Memory store reads should succeed.")
		.map(|secret| secret.expose().to_owned())
}

#[tokio::test]
async fn valid_token_is_attached_without_refresh() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store);
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-old");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"Mia\"}");
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let profile: Profile = client.get("/me").await.expect("Authenticated call should succeed.");

	assert_eq!(profile.name, "Mia");
	assert_eq!(counter.count(), 0);

	profile_mock.assert_async().await;
	refresh_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_replayed() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store.clone());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-old");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error_code\":\"TOKEN_EXPIRED\",\"message\":\"Token expired\",\"status\":401}");
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header("content-type", "application/json")
				.json_body(json!({ "refresh_token": "refresh-old" }));
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-new");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"Mia\"}");
		})
		.await;
	let profile: Profile = client.get("/me").await.expect("Replayed call should succeed.");

	assert_eq!(profile.name, "Mia");
	assert_eq!(stored(store.as_ref(), CredentialKey::AccessToken).await.as_deref(), Some("access-new"));
	assert_eq!(
		stored(store.as_ref(), CredentialKey::RefreshToken).await.as_deref(),
		Some("refresh-new")
	);
	assert_eq!(counter.count(), 0);
	assert_eq!(client.coordinator().metrics().successes(), 1);

	rejected.assert_calls_async(1).await;
	refresh_mock.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_expiry_refreshes_once() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store);
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/classes").header("authorization", "Bearer access-old");
			then.status(401);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(200))
				.body(REFRESHED_BODY);
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/classes").header("authorization", "Bearer access-new");
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let (a, b, c) = tokio::join!(
		client.send(ApiRequest::get("/classes")),
		client.send(ApiRequest::get("/classes")),
		client.send(ApiRequest::get("/classes")),
	);

	for response in [a, b, c] {
		let response = response.expect("Every concurrent call should succeed after the refresh.");

		assert!(response.is_success());
	}

	assert_eq!(counter.count(), 0);

	rejected.assert_calls_async(3).await;
	refresh_mock.assert_calls_async(1).await;
	accepted.assert_calls_async(3).await;
}

#[tokio::test]
async fn rejected_refresh_ends_session_once() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-revoked")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store.clone());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/payments");
			then.status(401);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(100))
				.body("{\"error_code\":\"REFRESH_REVOKED\",\"message\":\"Refresh token revoked\"}");
		})
		.await;
	let (first, second) = tokio::join!(
		client.send(ApiRequest::get("/payments")),
		client.send(ApiRequest::get("/payments")),
	);
	let first = first.expect_err("Rejected refresh should fail the first call.");
	let second = second.expect_err("Rejected refresh should fail the second call.");

	assert_eq!(first.code, ErrorCode::AuthError);
	assert_eq!(second.code, ErrorCode::AuthError);
	assert!(first.message.contains("Refresh token revoked"), "{}", first.message);
	assert_eq!(counter.count(), 1);
	assert!(store.load().await.expect("Memory store load should succeed.").is_empty());
	assert!(!client.is_authenticated().await);

	rejected.assert_calls_async(2).await;
	refresh_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn replayed_request_is_not_refreshed_twice() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store.clone());
	let always_rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/admin/reports");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"Token not accepted\"}");
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let err = client
		.send(ApiRequest::get("/admin/reports"))
		.await
		.expect_err("A second 401 should surface to the caller.");

	assert_eq!(err.code, ErrorCode::AuthError);
	assert_eq!(err.message, "Token not accepted");
	assert_eq!(err.http_status, Some(401));
	// The refresh itself succeeded, so the session survives.
	assert_eq!(counter.count(), 0);
	assert_eq!(stored(store.as_ref(), CredentialKey::AccessToken).await.as_deref(), Some("access-new"));

	always_rejected.assert_calls_async(2).await;
	refresh_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unauthorized_without_refresh_token_signs_out() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), None).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store.clone());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/children");
			then.status(401);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let err = client
		.send(ApiRequest::get("/children"))
		.await
		.expect_err("401 without a refresh token should fail.");

	assert_eq!(err.code, ErrorCode::AuthError);
	assert_eq!(err.http_status, Some(401));
	assert_eq!(counter.count(), 1);
	assert!(store.load().await.expect("Memory store load should succeed.").is_empty());

	rejected.assert_calls_async(1).await;
	refresh_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn non_auth_errors_are_normalized_without_refresh() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store);
	let conflict = server
		.mock_async(|when, then| {
			when.method(POST).path("/enrollments");
			then.status(409).header("content-type", "application/json").body(
				"{\"error_code\":\"CLASS_FULL\",\"message\":\"Class is full\",\"details\":{\"class_id\":3}}",
			);
		})
		.await;
	let forbidden = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/classes/3");
			then.status(403);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let err = client
		.post::<_, serde_json::Value>("/enrollments", &json!({ "class_id": 3, "child_id": 9 }))
		.await
		.expect_err("Conflicts should surface.");

	assert_eq!(err.code, ErrorCode::ConflictError);
	assert_eq!(err.message, "Class is full");
	assert_eq!(err.details, Some(json!({ "class_id": 3, "error_code": "CLASS_FULL" })));

	let err = client.delete("/classes/3").await.expect_err("Forbidden should surface.");

	assert_eq!(err.code, ErrorCode::ForbiddenError);
	assert_eq!(err.http_status, Some(403));
	assert_eq!(counter.count(), 0);

	conflict.assert_async().await;
	forbidden.assert_async().await;
	refresh_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn slow_responses_time_out_as_network_errors() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store);
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/galleries");
			then.status(200).delay(Duration::from_secs(2)).body("[]");
		})
		.await;
	let err = client
		.send(ApiRequest::get("/galleries").timeout(Duration::from_millis(100)))
		.await
		.expect_err("Deadline should expire before the response.");

	assert_eq!(err.code, ErrorCode::NetworkError);
	assert_eq!(err.http_status, None);
	assert_eq!(counter.count(), 0);
}

#[tokio::test]
async fn unbounded_timeout_still_refreshes_and_replays() {
	let server = MockServer::start_async().await;
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client(&server.base_url(), store);
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/galleries").header("authorization", "Bearer access-old");
			then.status(401);
		})
		.await;
	let replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/galleries").header("authorization", "Bearer access-new");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body(REFRESHED_BODY);
		})
		.await;
	let response = client
		.send(ApiRequest::get("/galleries").timeout(Duration::MAX))
		.await
		.expect("A request without a practical deadline should complete.");

	assert!(response.is_success());
	assert_eq!(counter.count(), 0);

	rejected.assert_async().await;
	replayed.assert_async().await;
	refresh_mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
	let store = seeded_store(Some("access-old"), Some("refresh-old")).await;
	let (client, counter) = build_reqwest_test_client("http://127.0.0.1:9", store);
	let err = client
		.send(ApiRequest::get("/me"))
		.await
		.expect_err("Nothing listens on the discard port.");

	assert_eq!(err.code, ErrorCode::NetworkError);
	assert_eq!(counter.count(), 0);
}

#[tokio::test]
async fn established_session_is_used_and_sign_out_clears_it() {
	let server = MockServer::start_async().await;
	let store = seeded_store(None, None).await;
	let counter = SignOutCounter::default();
	let client = SessionClient::<ReqwestTransport>::new(
		test_config(&server.base_url()),
		store.clone(),
		counter.clone(),
	)
	.expect("Reqwest-backed client should build.");
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-signed-in");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"Leo\"}");
		})
		.await;

	assert!(!client.is_authenticated().await);

	client
		.establish_session(TokenPair {
			access_token: AccessToken::new("access-signed-in"),
			refresh_token: RefreshToken::new("refresh-signed-in"),
		})
		.await
		.expect("Storing the session should succeed.");

	let profile: Profile = client.get("/me").await.expect("Signed-in call should succeed.");

	assert_eq!(profile.name, "Leo");
	assert!(client.sign_out().await);
	assert!(!client.sign_out().await);
	assert_eq!(counter.count(), 1);
	assert!(!client.is_authenticated().await);

	profile_mock.assert_async().await;
}
