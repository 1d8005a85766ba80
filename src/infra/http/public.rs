use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        access::Viewer,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follow::FollowService,
        posts::PostService,
        repos::{HealthRepo, UsersRepo},
        uploads::UploadStorageError,
    },
    cache::{CacheState, response_cache_layer},
    config::AuthSettings,
    infra::uploads::UploadStorage,
    presentation::views::{
        GroupTemplate, IndexTemplate, LayoutView, PostDetailTemplate, ProfileTemplate,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::resolve_viewer,
    db_health_response, follows,
    middleware::{log_responses, set_request_context},
    parse_id, posts,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub users: Arc<dyn UsersRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: Option<CacheState>,
    pub auth: AuthSettings,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global feed is cached; it renders nothing viewer-specific.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/media/{*path}", get(serve_upload))
        .route("/_health/db", get(public_health))
        .merge(posts::routes())
        .merge(follows::routes())
        .fallback(fallback);

    cached_routes
        .merge(routes)
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, resolve_viewer))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    pub(super) page: Option<String>,
}

async fn index(State(state): State<HttpState>, Query(query): Query<PageQuery>) -> Response {
    match state.feed.global_feed(query.page.as_deref()).await {
        Ok(context) => render_template_response(IndexTemplate::new(&context), StatusCode::OK),
        Err(err) => feed_error_to_response(err, &Viewer::Anonymous),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_feed(&slug, query.page.as_deref()).await {
        Ok(context) => render_template_response(
            GroupTemplate::new(viewer.username(), &context),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .author_feed(&username, &viewer, query.page.as_deref())
        .await
    {
        Ok(context) => render_template_response(
            ProfileTemplate::new(viewer.username(), &context),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &viewer),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return not_found(&viewer);
    };
    render_post_detail(&state, &viewer, id).await
}

/// Read-only post page; also the fallback view for non-authors editing a post.
pub(super) async fn render_post_detail(state: &HttpState, viewer: &Viewer, id: i64) -> Response {
    match state.feed.post_detail(id).await {
        Ok(context) => render_template_response(
            PostDetailTemplate::new(viewer.username(), &context),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer),
    }
}

pub(super) fn not_found(viewer: &Viewer) -> Response {
    render_not_found_response(LayoutView::new("Page not found", viewer.username()))
}

fn feed_error_to_response(err: FeedError, viewer: &Viewer) -> Response {
    let message = match err {
        FeedError::UnknownGroup => "Unknown group",
        FeedError::UnknownAuthor => "Unknown author",
        FeedError::UnknownPost => "Unknown post",
        err => return HttpError::from(err).into_response(),
    };
    let mut response = not_found(viewer);
    ErrorReport::from_message(
        "infra::http::feed_error_to_response",
        StatusCode::NOT_FOUND,
        message,
    )
    .attach(&mut response);
    response
}

async fn fallback(viewer: Viewer) -> Response {
    not_found(&viewer)
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn serve_upload(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => upload_not_found(SOURCE),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            upload_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn upload_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Upload not found",
        "The requested upload is not available",
    )
    .into_response()
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    // Stored names embed a random identifier, so the content never changes.
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    response
}
