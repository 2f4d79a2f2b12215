use axum::http::{HeaderMap, header};
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind, jwk::JwkSet,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::{
    config::AppConfig,
    error::{AuthError, AuthErrorKind},
};

/// TokenPayload
///
/// The verified claims of a bearer token. Only `permissions` drives authorization;
/// the rest is passed through to handlers that want to know who is calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject (sub): the identity-provider user id.
    #[serde(default)]
    pub sub: Option<String>,
    pub iss: String,
    /// Audience may be a single string or a list, depending on the issuer.
    pub aud: serde_json::Value,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    /// Permission strings granted to the caller, e.g. `get:drinks-detail`.
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// VerifiedToken
///
/// A payload that passed signature, claim and permission-presence checks.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub payload: TokenPayload,
    pub permissions: Vec<String>,
}

impl VerifiedToken {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// VerifierSetupError
///
/// Failures while preparing the verifier at startup or on an explicit refresh.
#[derive(Debug, thiserror::Error)]
pub enum VerifierSetupError {
    #[error("unsupported signing algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("failed to fetch signing keys: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// VerifierSettings
///
/// What a token must satisfy: issuer, audience and signing algorithm, plus where the
/// trusted keys are published.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    pub jwks_url: String,
}

impl VerifierSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, VerifierSetupError> {
        let algorithm = Algorithm::from_str(&config.jwt_algorithm)
            .map_err(|_| VerifierSetupError::UnsupportedAlgorithm(config.jwt_algorithm.clone()))?;
        Ok(Self {
            issuer: config.issuer(),
            audience: config.api_audience.clone(),
            algorithm,
            jwks_url: config.jwks_url.clone(),
        })
    }
}

/// TokenVerifier
///
/// Owns the cached set of trusted signing keys. The cache is filled by `discover`
/// and only replaced by an explicit `refresh`; verification never touches the
/// network.
pub struct TokenVerifier {
    settings: VerifierSettings,
    keys: RwLock<JwkSet>,
    http: reqwest::Client,
}

/// VerifierState
///
/// The shared handle stored in the application state.
pub type VerifierState = Arc<TokenVerifier>;

impl TokenVerifier {
    /// Builds a verifier around an already-known key set.
    pub fn new(settings: VerifierSettings, keys: JwkSet) -> Self {
        Self {
            settings,
            keys: RwLock::new(keys),
            http: reqwest::Client::new(),
        }
    }

    /// discover
    ///
    /// Fetches the key set from `settings.jwks_url` and builds the verifier.
    pub async fn discover(settings: VerifierSettings) -> Result<Self, VerifierSetupError> {
        let verifier = Self::new(settings, JwkSet { keys: vec![] });
        verifier.refresh().await?;
        Ok(verifier)
    }

    /// refresh
    ///
    /// Re-fetches the published key set and swaps it in. Returns the number of keys now
    /// trusted. On failure the previous set stays in place.
    pub async fn refresh(&self) -> Result<usize, VerifierSetupError> {
        let fetched: JwkSet = self
            .http
            .get(&self.settings.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let count = fetched.keys.len();
        *self.keys.write().unwrap_or_else(|p| p.into_inner()) = fetched;
        tracing::info!(url = %self.settings.jwks_url, keys = count, "signing keys refreshed");
        Ok(count)
    }

    /// Extracts the bearer token from `headers` and verifies it.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<VerifiedToken, AuthError> {
        let token = bearer_token(headers)?;
        self.verify(token)
    }

    /// verify
    ///
    /// Locates the signing key named by the token's `kid`, checks signature, expiry,
    /// audience and issuer, and requires a `permissions` claim.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = decode_header(token).map_err(|_| {
            AuthError::new(
                AuthErrorKind::InvalidToken,
                "Unable to parse authentication token.",
            )
        })?;
        let kid = header.kid.ok_or_else(|| {
            AuthError::new(AuthErrorKind::InvalidHeader, "Authorization malformed.")
        })?;

        let key = {
            let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
            let jwk = keys.find(&kid).ok_or_else(|| {
                AuthError::new(
                    AuthErrorKind::InvalidToken,
                    "Unable to find the appropriate key.",
                )
            })?;
            DecodingKey::from_jwk(jwk).map_err(|_| {
                AuthError::new(
                    AuthErrorKind::InvalidToken,
                    "Unable to find the appropriate key.",
                )
            })?
        };

        let mut validation = Validation::new(self.settings.algorithm);
        validation.set_audience(&[&self.settings.audience]);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        // An `exp` in the past is expired, with no grace period.
        validation.leeway = 0;

        let data = decode::<TokenPayload>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                AuthError::new(AuthErrorKind::TokenExpired, "Token expired.")
            }
            ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => {
                AuthError::new(
                    AuthErrorKind::InvalidClaims,
                    "Incorrect claims. Please, check the audience and issuer.",
                )
            }
            _ => AuthError::new(
                AuthErrorKind::InvalidToken,
                "Unable to parse authentication token.",
            ),
        })?;

        let permissions = data.claims.permissions.clone().ok_or_else(|| {
            AuthError::new(
                AuthErrorKind::InvalidPermissions,
                "Permissions not included in JWT.",
            )
        })?;

        Ok(VerifiedToken {
            payload: data.claims,
            permissions,
        })
    }
}

/// bearer_token
///
/// Pulls the token out of an `Authorization: Bearer <token>` header. The value must
/// be exactly two space-separated parts, the first being `Bearer`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(header::AUTHORIZATION).ok_or_else(|| {
        AuthError::new(
            AuthErrorKind::MissingHeader,
            "Authorization header is expected.",
        )
    })?;
    let value = value.to_str().map_err(|_| {
        AuthError::new(
            AuthErrorKind::InvalidHeader,
            "Authorization header must be bearer token.",
        )
    })?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(AuthError::new(
            AuthErrorKind::InvalidHeader,
            "Authorization header must be bearer token.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn bearer_token_accepts_two_part_header() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_missing_header() {
        let err = bearer_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::MissingHeader);
    }

    #[test]
    fn bearer_token_rejects_malformed_headers() {
        for value in ["Bearer", "Basic abc", "Bearer a b", "bearer abc", "Bearer "] {
            let err = bearer_token(&headers(value)).unwrap_err();
            assert_eq!(err.kind, AuthErrorKind::InvalidHeader, "value: {value:?}");
        }
    }

    #[test]
    fn settings_reject_unknown_algorithm() {
        let config = AppConfig {
            jwt_algorithm: "ROT13".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            VerifierSettings::from_config(&config),
            Err(VerifierSetupError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn settings_derive_issuer_from_domain() {
        let settings = VerifierSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.issuer, "https://dev-coffee.us.auth0.com/");
        assert_eq!(settings.algorithm, Algorithm::RS256);
    }
}
