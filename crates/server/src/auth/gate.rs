//! Per-request bearer-token check against the configured secret and
//! algorithm set.

use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::config::JwtConfig;
use common::protocol::ErrorResponse;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;

/// Outcome of a single authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Rejected(AuthRejection),
}

/// Why a request was turned away.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`AuthRejection::MissingToken`] → 401
/// - [`AuthRejection::Expired`] → 401
/// - [`AuthRejection::Invalid`] → 403
/// - [`AuthRejection::Internal`] → 500
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("no authentication token provided")]
    MissingToken,

    #[error("session expired")]
    Expired,

    /// Bad signature, malformed structure, or an algorithm outside the
    /// configured set.
    #[error("token malformed or invalid")]
    Invalid,

    /// Verification could not be carried out, e.g. the configured key is
    /// unusable for the token's algorithm.
    #[error("unexpected error during authentication")]
    Internal,
}

impl AuthRejection {
    /// Returns the HTTP status code that should be sent for this rejection.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AuthRejection::MissingToken | AuthRejection::Expired => StatusCode::UNAUTHORIZED,
            AuthRejection::Invalid => StatusCode::FORBIDDEN,
            AuthRejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent with the rejection.
    pub fn body(&self) -> ErrorResponse {
        match self {
            AuthRejection::MissingToken => {
                ErrorResponse::new("Authentication failed", "No authentication token provided")
            }
            AuthRejection::Expired => {
                ErrorResponse::new("Token expired", "Your session expired. Please log in again")
            }
            AuthRejection::Invalid => {
                ErrorResponse::new("Invalid token", "Authentication token is malformed or invalid")
            }
            AuthRejection::Internal => ErrorResponse::new(
                "Authentication error",
                "An unexpected error occurred during authentication",
            ),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.http_status(), Json(self.body())).into_response()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Key family an algorithm name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn of(name: &str) -> Option<Self> {
        match name.get(..2)? {
            "HS" => Some(KeyFamily::Hmac),
            "RS" | "PS" => Some(KeyFamily::Rsa),
            "ES" => Some(KeyFamily::Ec),
            "Ed" => Some(KeyFamily::Ed),
            _ => None,
        }
    }

    fn key(self, secret: &str) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        match self {
            KeyFamily::Hmac => Ok(DecodingKey::from_secret(secret.as_bytes())),
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(secret.as_bytes()),
            KeyFamily::Ec => DecodingKey::from_ec_pem(secret.as_bytes()),
            KeyFamily::Ed => DecodingKey::from_ed_pem(secret.as_bytes()),
        }
    }
}

/// Decoding key plus the accepted algorithms that share it.
struct Verifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

/// Token check for one resolved [`JwtConfig`].
///
/// Keys and validation rules are prepared once here; every call to
/// [`AuthGate::authenticate`] verifies from scratch and keeps no state.
pub struct AuthGate {
    enable: bool,
    verifiers: Vec<Verifier>,
}

impl AuthGate {
    pub fn new(cfg: &JwtConfig) -> Self {
        let mut grouped: Vec<(KeyFamily, Vec<Algorithm>)> = Vec::new();
        for name in &cfg.algorithms {
            let (Some(family), Ok(alg)) = (KeyFamily::of(name), Algorithm::from_str(name)) else {
                continue;
            };
            match grouped.iter_mut().find(|(f, _)| *f == family) {
                Some((_, algs)) => algs.push(alg),
                None => grouped.push((family, vec![alg])),
            }
        }

        let verifiers = grouped
            .into_iter()
            .map(|(family, algorithms)| Verifier {
                key: family.key(&cfg.secret).ok(),
                validation: validation_for(algorithms),
            })
            .collect();

        Self {
            enable: cfg.enable,
            verifiers,
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// `token` is only consulted when the gate is enabled; a disabled gate
    /// allows everything without looking.
    pub fn authenticate<F>(&self, token: F) -> AuthDecision
    where
        F: FnOnce() -> Option<String>,
    {
        if !self.enable {
            return AuthDecision::Allowed;
        }

        let token = match token() {
            Some(t) if !t.is_empty() => t,
            _ => return AuthDecision::Rejected(AuthRejection::MissingToken),
        };

        match self.verify(&token) {
            Ok(()) => AuthDecision::Allowed,
            Err(rejection) => AuthDecision::Rejected(rejection),
        }
    }

    fn verify(&self, token: &str) -> Result<(), AuthRejection> {
        let header = decode_header(token).map_err(|_| AuthRejection::Invalid)?;

        let verifier = self
            .verifiers
            .iter()
            .find(|v| v.validation.algorithms.contains(&header.alg))
            .ok_or(AuthRejection::Invalid)?;

        let key = verifier.key.as_ref().ok_or(AuthRejection::Internal)?;

        // Claims are checked for exp/nbf and then dropped.
        decode::<serde_json::Value>(token, key, &verifier.validation)
            .map(|_| ())
            .map_err(classify)
    }
}

fn validation_for(algorithms: Vec<Algorithm>) -> Validation {
    let mut validation = Validation::new(algorithms[0]);
    validation.algorithms = algorithms;
    validation.required_spec_claims.clear();
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation
}

fn classify(error: jsonwebtoken::errors::Error) -> AuthRejection {
    match error.kind() {
        ErrorKind::ExpiredSignature => AuthRejection::Expired,
        ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::RsaFailedSigning => AuthRejection::Internal,
        _ => AuthRejection::Invalid,
    }
}
