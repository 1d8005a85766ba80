//! Authentication seam.
//!
//! An authenticating proxy forwards the username in a configured header. The
//! middleware here turns that header into a [`Viewer`] stored in request
//! extensions; handlers extract it directly.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, HeaderName, Request, Uri, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::application::access::{Viewer, login_redirect_target};

use super::{public::HttpState, redirect_found, repo_failure};

const SOURCE: &str = "quillpost::http::auth";

pub(super) async fn resolve_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = match forwarded_username(request.headers(), &state.auth.user_header) {
        None => Viewer::Anonymous,
        Some(username) => match state.users.find_by_username(&username).await {
            Ok(Some(user)) => Viewer::User(user),
            Ok(None) => {
                warn!(
                    target = SOURCE,
                    username = %username,
                    "forwarded user is unknown; treating request as anonymous"
                );
                Viewer::Anonymous
            }
            Err(err) => return repo_failure("infra::http::auth::resolve_viewer", err),
        },
    };

    request.extensions_mut().insert(viewer);
    next.run(request).await
}

fn forwarded_username(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// Send the visitor to the login page, coming back to `uri` afterwards.
pub(super) fn login_redirect(login_url: &str, uri: &Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    redirect_found(&login_redirect_target(login_url, target))
}
