//! Shared fixtures: one registered client, a manual clock, in-memory stores.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use auth_server::{
    hash_secret, router, AppState, Client, ClientRegistry, CodeStore, GrantEngine, InMemoryClients,
    InMemoryCodes, ManualClock, OsRandom, Scope, TokenIssuer, TokenStore,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
};
use chrono::{Duration, Utc};
use tower::ServiceExt;

pub const CLIENT_ID: &str = "abc";
pub const CLIENT_SECRET: &str = "s3cret";
pub const REDIRECT_URI: &str = "https://x/cb";

pub fn test_client() -> Client {
    Client {
        client_id: CLIENT_ID.to_string(),
        client_name: Some("Test client".to_string()),
        client_secret_hash: hash_secret(CLIENT_SECRET),
        redirect_uris: HashSet::from([REDIRECT_URI.to_string()]),
        scopes: Scope::parse("read write"),
    }
}

pub fn test_engine() -> (GrantEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let random = Arc::new(OsRandom::new());

    let engine = GrantEngine::new(
        ClientRegistry::new(Arc::new(InMemoryClients::new([test_client()]))),
        CodeStore::new(
            Arc::new(InMemoryCodes::new()),
            clock.clone(),
            random.clone(),
            Duration::seconds(600),
        ),
        TokenIssuer::new(
            Arc::new(TokenStore::in_memory()),
            clock.clone(),
            random,
            Duration::hours(1),
        ),
    );
    (engine, clock)
}

pub fn test_state() -> (Arc<AppState>, Arc<ManualClock>) {
    let (engine, clock) = test_engine();
    let state = Arc::new(AppState {
        engine,
        public_url: "https://auth.example.com".to_string(),
    });
    (state, clock)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parsed `Location` header of a redirect
    pub fn location(&self) -> url::Url {
        let location = self
            .header(header::LOCATION.as_str())
            .expect("Missing Location header");
        url::Url::parse(location).expect("Location is not a URL")
    }
}

/// Query parameter from a URL, asserting it appears once
pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    let values: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .collect();
    assert!(values.len() <= 1, "{name} appears more than once in {url}");
    values.into_iter().next()
}

pub async fn send(state: &Arc<AppState>, request: Request<Body>) -> TestResponse {
    let response = router(state.clone())
        .oneshot(request)
        .await
        .expect("Failed to execute request");

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(state: &Arc<AppState>, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    send(state, request).await
}

pub async fn post_form(state: &Arc<AppState>, uri: &str, body: &str) -> TestResponse {
    post_form_with(state, uri, body, &[]).await
}

pub async fn post_form_with(
    state: &Arc<AppState>,
    uri: &str,
    body: &str,
    headers: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    for (key, value) in headers {
        builder = builder.header(*key, *value);
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request");
    send(state, request).await
}

/// Run the authorize leg for the test client and return the issued code
pub async fn authorize_code(state: &Arc<AppState>, scope: &str) -> String {
    let response = get(
        state,
        &format!(
            "/authorize?response_type=code&client_id={CLIENT_ID}&redirect_uri={REDIRECT_URI}&scope={scope}&state=xyz"
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);
    query_param(&response.location(), "code").expect("Redirect carries no code")
}

pub fn token_body(code: &str) -> String {
    format!(
        "grant_type=authorization_code&code={code}&redirect_uri={REDIRECT_URI}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}"
    )
}
