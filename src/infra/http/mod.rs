mod admin;
mod auth;
mod follows;
mod middleware;
mod posts;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use public::{HttpState, build_router};

use crate::application::error::{ErrorReport, HttpError, repo_error_to_http};
use crate::application::repos::RepoError;
use axum::http::{HeaderValue, StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// `302 Found` to `location`.
fn redirect_found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => HttpError::new(
            "infra::http::redirect_found",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            format!("redirect target is not a valid header value: {location}"),
        )
        .into_response(),
    }
}

/// Numeric path ids that fail to parse are treated as unknown resources.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn repo_failure(source: &'static str, err: RepoError) -> Response {
    repo_error_to_http(source, err).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("9999999999999999999999"), None);
    }

    #[test]
    fn redirect_uses_found_status() {
        let response = redirect_found("/posts/1/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/posts/1/");
    }

    #[test]
    fn failed_ping_is_unavailable() {
        let response = db_health_response(Err(RepoError::Timeout));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_some());
        assert_eq!(
            db_health_response(Ok(())).status(),
            StatusCode::NO_CONTENT
        );
    }
}
