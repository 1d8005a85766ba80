//! Request id propagation and response logging shared by both listeners.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::{access::Viewer, error::ErrorReport};

const SOURCE: &str = "quillpost::http::response";
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse a proxy-supplied `x-request-id` or mint one, and echo it back.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// One line per failed request; 5xx at `error`, other 4xx at `warn`.
/// Not-found pages and successes only show up at `debug`.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request_id_of(&request).to_string();
    let viewer = request
        .extensions()
        .get::<Viewer>()
        .and_then(Viewer::username)
        .map(str::to_string);

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let viewer = viewer.as_deref().unwrap_or("-");

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = SOURCE,
            request_id = %request_id,
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            viewer,
            elapsed_ms,
            "request served"
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));

    if status.is_server_error() {
        error!(
            target = SOURCE,
            request_id = %request_id,
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            viewer,
            elapsed_ms,
            source,
            chain = ?chain,
            "request failed"
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            target = SOURCE,
            request_id = %request_id,
            method = %method,
            uri = %uri,
            viewer,
            source,
            "not found"
        );
    } else {
        warn!(
            target = SOURCE,
            request_id = %request_id,
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            viewer,
            elapsed_ms,
            source,
            detail = chain.first().map(String::as_str).unwrap_or("-"),
            "request rejected"
        );
    }

    response
}

/// The id assigned by [`set_request_context`], or `-` outside of it.
fn request_id_of<B>(request: &Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.request_id.as_str())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, middleware, routing::get};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/whoami",
                get(|Extension(context): Extension<RequestContext>| async move {
                    context.request_id
                }),
            )
            .layer(middleware::from_fn(log_responses))
            .layer(middleware::from_fn(set_request_context))
    }

    #[tokio::test]
    async fn request_id_is_generated_when_missing() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[&REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn upstream_request_id_is_echoed() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "proxy-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[&REQUEST_ID_HEADER], "proxy-42");
    }

    #[tokio::test]
    async fn handlers_see_the_echoed_request_id() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("x-request-id", "proxy-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[&REQUEST_ID_HEADER], "proxy-7");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"proxy-7");
    }

    #[test]
    fn request_id_falls_back_outside_context() {
        let bare = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(request_id_of(&bare), "-");

        let mut tagged = Request::builder().uri("/").body(()).unwrap();
        tagged.extensions_mut().insert(RequestContext {
            request_id: "abc".to_string(),
        });
        assert_eq!(request_id_of(&tagged), "abc");
    }
}
