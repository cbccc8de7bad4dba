//! JWT gating for the content routes.
//!
//! The gate itself ([`AuthGate`]) is a pure decision function. [`require_token`]
//! adapts it to an Axum middleware that reads the `token` query parameter and
//! turns a rejection into a JSON error response.
//!
//! The middleware is only attached to the routes when JWT is enabled, so with
//! JWT disabled no request ever reaches this code.

pub mod gate;

pub use gate::{AuthDecision, AuthGate};

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Read the `token` query parameter. An unparsable query string counts as
/// "no token".
pub fn token_from_query(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// Axum middleware running [`AuthGate`] ahead of the wrapped handler.
pub async fn require_token(
    State(gate): State<Arc<AuthGate>>,
    req: Request,
    next: Next,
) -> Response {
    match gate.authenticate(|| token_from_query(req.uri())) {
        AuthDecision::Allowed => next.run(req).await,
        AuthDecision::Rejected(rejection) => {
            debug!(path = %req.uri().path(), reason = %rejection, "request rejected");
            rejection.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_query() {
        let uri: Uri = "/wetty?token=abc.def.ghi&x=1".parse().unwrap();
        assert_eq!(token_from_query(&uri).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn token_is_percent_decoded() {
        let uri: Uri = "/wetty?token=a%2Bb".parse().unwrap();
        assert_eq!(token_from_query(&uri).as_deref(), Some("a+b"));
    }

    #[test]
    fn missing_query_yields_none() {
        let uri: Uri = "/wetty".parse().unwrap();
        assert_eq!(token_from_query(&uri), None);
        let uri: Uri = "/wetty?other=1".parse().unwrap();
        assert_eq!(token_from_query(&uri), None);
    }
}
