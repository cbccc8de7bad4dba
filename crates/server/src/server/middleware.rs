//! Axum middleware applied around the routes.
//!
//! Includes fingerprint-header stripping, request metrics, the trailing-slash
//! redirect, and the security-header values.

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::state::MetricsScope;

const POWERED_BY: &str = "x-powered-by";

const CSP_COMMON: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline'; \
    style-src 'self' 'unsafe-inline'; \
    font-src 'self' data:; \
    img-src 'self' data:; \
    connect-src 'self'";

const CSP_SAME_ORIGIN_FRAMES: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline'; \
    style-src 'self' 'unsafe-inline'; \
    font-src 'self' data:; \
    img-src 'self' data:; \
    connect-src 'self'; \
    frame-ancestors 'self'";

/// Remove headers that advertise the server implementation.
pub async fn strip_fingerprint(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.remove(POWERED_BY);
    headers.remove(header::SERVER);
    response
}

/// Record request count and latency for paths under the base path.
pub async fn track_metrics(State(scope): State<MetricsScope>, req: Request, next: Next) -> Response {
    if !scope.covers(req.uri().path()) {
        return next.run(req).await;
    }

    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Permanently redirect `/x/` to `/x` (query preserved), and `/` to the base
/// path when the server is not mounted at the root.
pub async fn redirect(State(base): State<Arc<str>>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let target = if path == "/" {
        (!base.is_empty()).then(|| base.to_string())
    } else {
        path.strip_suffix('/').map(str::to_owned)
    };

    // A target starting with `//` is a protocol-relative URL to another host.
    let Some(mut location) = target.filter(|t| !t.starts_with("//")) else {
        return next.run(req).await;
    };
    if let Some(query) = req.uri().query() {
        location.push('?');
        location.push_str(query);
    }
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// `X-Frame-Options` value; omitted when iframe embedding is allowed.
pub fn frame_options(allow_iframe: bool) -> Option<HeaderValue> {
    (!allow_iframe).then(|| HeaderValue::from_static("SAMEORIGIN"))
}

/// `Content-Security-Policy` value; `frame-ancestors` is dropped when iframe
/// embedding is allowed.
pub fn content_security_policy(allow_iframe: bool) -> HeaderValue {
    if allow_iframe {
        HeaderValue::from_static(CSP_COMMON)
    } else {
        HeaderValue::from_static(CSP_SAME_ORIGIN_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn redirect_app(base: &str) -> Router {
        Router::new()
            .route("/wetty", get(|| async { "page" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn_with_state(Arc::<str>::from(base), redirect))
    }

    async fn send(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn trailing_slash_is_redirected() {
        let resp = send(redirect_app("/wetty"), "/wetty/?token=t").await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/wetty?token=t");
    }

    #[tokio::test]
    async fn protocol_relative_target_is_not_redirected() {
        for uri in ["//evil.example.com/", "///evil.example.com/", "//evil.example.com/?x=1"] {
            let resp = send(redirect_app("/wetty"), uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(resp.headers().get(header::LOCATION).is_none(), "{uri}");
        }
    }

    #[tokio::test]
    async fn root_redirects_to_base() {
        let resp = send(redirect_app("/wetty"), "/").await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/wetty");
    }

    #[tokio::test]
    async fn root_is_left_alone_without_base() {
        let resp = send(redirect_app(""), "/").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn paths_without_trailing_slash_pass_through() {
        let resp = send(redirect_app("/wetty"), "/wetty").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fingerprint_headers_are_removed() {
        let app = Router::new()
            .route(
                "/",
                get(|| async { ([(POWERED_BY, "Express"), ("server", "hyper")], "ok") }),
            )
            .layer(middleware::map_response(strip_fingerprint));
        let resp = send(app, "/").await;
        assert!(resp.headers().get(POWERED_BY).is_none());
        assert!(resp.headers().get(header::SERVER).is_none());
    }

    #[tokio::test]
    async fn metrics_middleware_passes_responses_through() {
        let app = Router::new()
            .route("/wetty", get(|| async { StatusCode::ACCEPTED }))
            .route("/other", get(|| async { StatusCode::CREATED }))
            .layer(middleware::from_fn_with_state(MetricsScope::new("/wetty"), track_metrics));
        assert_eq!(send(app.clone(), "/wetty").await.status(), StatusCode::ACCEPTED);
        assert_eq!(send(app, "/other").await.status(), StatusCode::CREATED);
    }

    #[test]
    fn frame_policy_follows_iframe_flag() {
        assert_eq!(frame_options(false), Some(HeaderValue::from_static("SAMEORIGIN")));
        assert_eq!(frame_options(true), None);
        assert!(content_security_policy(false)
            .to_str()
            .unwrap()
            .contains("frame-ancestors 'self'"));
        assert!(!content_security_policy(true)
            .to_str()
            .unwrap()
            .contains("frame-ancestors"));
    }
}
