//! Post and comment commands: create, edit, delete, comment.

use axum::{
    Form, Router,
    extract::{Path, State, rejection::FormRejection},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::{Multipart, multipart::MultipartRejection};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::{
    access::{PostAccess, Viewer, comment_deletion, post_modification, require_login},
    error::HttpError,
    posts::{ImageUpload, PostCommandError, PostFormInput},
};
use crate::domain::entities::{PostEntry, UserRecord};
use crate::presentation::views::{
    PostFormTemplate, post_url, profile_url, render_template_response,
};

use super::{
    auth::login_redirect,
    parse_id,
    public::{HttpState, not_found, render_post_detail},
    redirect_found,
};

const SOURCE: &str = "quillpost::http::posts";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/create/", get(create_form).post(create_submit))
        .route("/posts/{id}/edit/", get(edit_form).post(edit_submit))
        .route("/posts/{id}/delete/", get(delete_post).post(delete_post))
        .route("/posts/{id}/comment/", get(comment_get).post(comment_submit))
        .route(
            "/comments/{id}/delete/",
            get(delete_comment).post(delete_comment),
        )
}

/// Outcome of the login and ownership checks shared by the post handlers.
enum Gate<T> {
    Pass(T),
    Respond(Response),
}

fn signed_in(state: &HttpState, viewer: &Viewer, uri: &Uri) -> Gate<UserRecord> {
    match (require_login(viewer), viewer.user()) {
        (PostAccess::Allowed, Some(user)) => Gate::Pass(user.clone()),
        _ => Gate::Respond(login_redirect(&state.auth.login_url, uri)),
    }
}

async fn load_post(state: &HttpState, viewer: &Viewer, raw_id: &str) -> Gate<PostEntry> {
    let Some(id) = parse_id(raw_id) else {
        return Gate::Respond(not_found(viewer));
    };
    match state.posts.find_post(id).await {
        Ok(entry) => Gate::Pass(entry),
        Err(PostCommandError::UnknownPost) => Gate::Respond(not_found(viewer)),
        Err(err) => Gate::Respond(HttpError::from(err).into_response()),
    }
}

macro_rules! pass {
    ($gate:expr) => {
        match $gate {
            Gate::Pass(value) => value,
            Gate::Respond(response) => return response,
        }
    };
}

async fn create_form(State(state): State<HttpState>, viewer: Viewer, uri: Uri) -> Response {
    let user = pass!(signed_in(&state, &viewer, &uri));
    match state.posts.groups().await {
        Ok(groups) => render_template_response(
            PostFormTemplate::create(&user.username, &groups),
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn create_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let user = pass!(signed_in(&state, &viewer, &uri));
    let input = match read_post_form(multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };
    let (text, group) = (input.text.clone(), input.group.clone());

    match state.posts.create_post(&user, input).await {
        Ok(_) => redirect_found(&profile_url(&user.username)),
        Err(PostCommandError::Invalid(errors)) => {
            debug!(target = SOURCE, errors = %errors, "post form rejected");
            let groups = match state.posts.groups().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            render_template_response(
                PostFormTemplate::create(&user.username, &groups).with_submission(
                    &text,
                    group.as_deref(),
                    &errors,
                ),
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn edit_form(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    let user = pass!(signed_in(&state, &viewer, &uri));
    let entry = pass!(load_post(&state, &viewer, &raw_id).await);

    match post_modification(&viewer, entry.post.author_id) {
        PostAccess::Allowed => match state.posts.groups().await {
            Ok(groups) => render_template_response(
                PostFormTemplate::edit(&user.username, &entry, &groups),
                StatusCode::OK,
            ),
            Err(err) => HttpError::from(err).into_response(),
        },
        PostAccess::ViewOnlyFallback => render_post_detail(&state, &viewer, entry.post.id).await,
        PostAccess::LoginRequired => login_redirect(&state.auth.login_url, &uri),
    }
}

async fn edit_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let user = pass!(signed_in(&state, &viewer, &uri));
    let entry = pass!(load_post(&state, &viewer, &raw_id).await);

    match post_modification(&viewer, entry.post.author_id) {
        PostAccess::Allowed => {}
        PostAccess::ViewOnlyFallback => {
            warn!(
                target = SOURCE,
                post_id = entry.post.id,
                user = %user.username,
                "edit attempted by non-author"
            );
            return render_post_detail(&state, &viewer, entry.post.id).await;
        }
        PostAccess::LoginRequired => return login_redirect(&state.auth.login_url, &uri),
    }

    let input = match read_post_form(multipart).await {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };
    let (text, group) = (input.text.clone(), input.group.clone());

    match state.posts.update_post(&entry, input).await {
        Ok(post) => redirect_found(&post_url(post.id)),
        Err(PostCommandError::Invalid(errors)) => {
            let groups = match state.posts.groups().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(err).into_response(),
            };
            render_template_response(
                PostFormTemplate::edit(&user.username, &entry, &groups).with_submission(
                    &text,
                    group.as_deref(),
                    &errors,
                ),
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn delete_post(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    pass!(signed_in(&state, &viewer, &uri));
    let entry = pass!(load_post(&state, &viewer, &raw_id).await);

    match post_modification(&viewer, entry.post.author_id) {
        PostAccess::Allowed => match state.posts.delete_post(&entry).await {
            Ok(()) => redirect_found("/"),
            Err(err) => HttpError::from(err).into_response(),
        },
        PostAccess::ViewOnlyFallback => redirect_found(&post_url(entry.post.id)),
        PostAccess::LoginRequired => login_redirect(&state.auth.login_url, &uri),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    text: String,
}

/// A comment form is only processed on POST; GET just returns to the post.
async fn comment_get(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    pass!(signed_in(&state, &viewer, &uri));
    let entry = pass!(load_post(&state, &viewer, &raw_id).await);
    redirect_found(&post_url(entry.post.id))
}

async fn comment_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Response {
    let user = pass!(signed_in(&state, &viewer, &uri));
    let Some(post_id) = parse_id(&raw_id) else {
        return not_found(&viewer);
    };
    let text = match form {
        Ok(Form(form)) => form.text,
        Err(rejection) => {
            debug!(target = SOURCE, error = %rejection, "unreadable comment form");
            String::new()
        }
    };

    match state.posts.add_comment(&user, post_id, &text).await {
        Ok(_) => redirect_found(&post_url(post_id)),
        Err(PostCommandError::Invalid(errors)) => {
            debug!(target = SOURCE, post_id, errors = %errors, "comment rejected");
            redirect_found(&post_url(post_id))
        }
        Err(PostCommandError::UnknownPost) => not_found(&viewer),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn delete_comment(
    State(state): State<HttpState>,
    viewer: Viewer,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    pass!(signed_in(&state, &viewer, &uri));
    let Some(id) = parse_id(&raw_id) else {
        return not_found(&viewer);
    };
    let comment = match state.posts.find_comment(id).await {
        Ok(comment) => comment,
        Err(PostCommandError::UnknownComment) => return not_found(&viewer),
        Err(err) => return HttpError::from(err).into_response(),
    };

    match comment_deletion(&viewer, comment.author_id) {
        PostAccess::Allowed => {
            if let Err(err) = state.posts.delete_comment(&comment).await {
                return HttpError::from(err).into_response();
            }
        }
        PostAccess::ViewOnlyFallback => {
            debug!(
                target = SOURCE,
                comment_id = comment.id,
                "comment delete ignored for non-author"
            );
        }
        PostAccess::LoginRequired => return login_redirect(&state.auth.login_url, &uri),
    }
    redirect_found(&post_url(comment.post_id))
}

async fn read_post_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PostFormInput, HttpError> {
    const FORM_SOURCE: &str = "infra::http::posts::read_post_form";

    let mut multipart = multipart.map_err(|rejection| {
        HttpError::from_error(
            FORM_SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid form submission",
            &rejection,
        )
    })?;
    let multipart_error = |err: axum_extra::extract::multipart::MultipartError| {
        let status = err.status();
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Uploaded file is too large"
        } else {
            "Invalid form submission"
        };
        HttpError::from_error(FORM_SOURCE, status, message, &err)
    };

    let mut input = PostFormInput::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => input.text = field.text().await.map_err(multipart_error)?,
            "group" => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                input.group = (!value.is_empty()).then(|| value.to_string());
            }
            "clear_image" => {
                let value = field.text().await.map_err(multipart_error)?;
                input.clear_image = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "yes"
                );
            }
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                if !filename.is_empty() || !data.is_empty() {
                    input.image = Some(ImageUpload { filename, data });
                }
            }
            _ => {}
        }
    }
    Ok(input)
}
