#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use coffee_shop_api::{
    AppState, RepositoryState, TokenVerifier, VerifierSettings, create_router,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode, jwk::JwkSet};
use serde_json::{Value, json};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

// --- Key Material ---

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
// A different RSA key that claims the trusted key id.
pub const ROGUE_KEY: &str = include_str!("../fixtures/rogue_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KID: &str = "coffee-test-key";

pub const ISSUER: &str = "https://dev-coffee.us.auth0.com/";
pub const AUDIENCE: &str = "drinks";

pub const MANAGER: &[&str] = &[
    "get:drinks-detail",
    "post:drinks",
    "patch:drinks",
    "delete:drinks",
];
pub const BARISTA: &[&str] = &["get:drinks-detail"];

// --- Token Helpers ---

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn claims(permissions: &[&str]) -> Value {
    json!({
        "sub": "auth0|barista",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now(),
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

pub fn sign_with(pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn token(permissions: &[&str]) -> String {
    sign_with(SIGNING_KEY, Some(KID), &claims(permissions))
}

pub fn key_set() -> JwkSet {
    serde_json::from_str(JWKS).unwrap()
}

pub fn settings(jwks_url: &str) -> VerifierSettings {
    VerifierSettings {
        issuer: ISSUER.to_string(),
        audience: AUDIENCE.to_string(),
        algorithm: Algorithm::RS256,
        jwks_url: jwks_url.to_string(),
    }
}

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(settings("http://127.0.0.1:9/unused"), key_set())
}

// --- App Helpers ---

pub fn app_with(repo: RepositoryState) -> Router {
    create_router(AppState {
        repo,
        verifier: Arc::new(verifier()),
    })
}

/// Sends one request through the router and returns the status and JSON body
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
