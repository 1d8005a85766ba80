//! Follow feed and follow/unfollow actions.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{
    access::Viewer,
    error::HttpError,
    follow::FollowError,
};
use crate::presentation::views::{FollowTemplate, LayoutView, render_template_response};

use super::{
    auth::login_redirect,
    public::{HttpState, PageQuery, not_found},
    redirect_found,
};

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

async fn follow_index(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(user) = viewer.user() else {
        return login_redirect(&state.auth.login_url, &uri);
    };

    match state.feed.follow_feed(user.id, query.page.as_deref()).await {
        Ok(context) => render_template_response(
            FollowTemplate::new(
                LayoutView::new("Following", Some(&user.username)),
                &context,
            ),
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Whatever the outcome, the visitor lands back on the global feed.
async fn profile_follow(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(username): Path<String>,
) -> Response {
    let Some(user) = viewer.user() else {
        return login_redirect(&state.auth.login_url, &uri);
    };

    match state.follows.follow(user, &username).await {
        Ok(_) => redirect_found("/"),
        Err(err) => follow_error_response(err, &viewer),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(username): Path<String>,
) -> Response {
    let Some(user) = viewer.user() else {
        return login_redirect(&state.auth.login_url, &uri);
    };

    match state.follows.unfollow(user, &username).await {
        Ok(_) => redirect_found("/"),
        Err(err) => follow_error_response(err, &viewer),
    }
}

fn follow_error_response(err: FollowError, viewer: &Viewer) -> Response {
    match err {
        FollowError::UnknownAuthor(_) => not_found(viewer),
        err => HttpError::from(err).into_response(),
    }
}
