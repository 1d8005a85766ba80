//! Who may do what with posts, comments and follow edges.
//!
//! The decisions here are pure. Handlers translate a [`PostAccess`] into a
//! response: `LoginRequired` becomes a redirect to the login page and
//! `ViewOnlyFallback` shows (or redirects to) the read-only post detail.

use url::form_urlencoded;

use crate::domain::entities::UserRecord;

/// Identity acting on a request, resolved by the authentication seam.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(UserRecord),
}

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|user| user.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.user().map(|user| user.username.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAccess {
    Allowed,
    ViewOnlyFallback,
    LoginRequired,
}

/// Gate for actions that only need an authenticated identity.
pub fn require_login(viewer: &Viewer) -> PostAccess {
    if viewer.is_authenticated() {
        PostAccess::Allowed
    } else {
        PostAccess::LoginRequired
    }
}

/// Edit and delete of a post are reserved to its author.
pub fn post_modification(viewer: &Viewer, author_id: i64) -> PostAccess {
    owner_only(viewer, author_id)
}

/// Deleting a comment is reserved to the comment author.
pub fn comment_deletion(viewer: &Viewer, author_id: i64) -> PostAccess {
    owner_only(viewer, author_id)
}

fn owner_only(viewer: &Viewer, owner_id: i64) -> PostAccess {
    match viewer.user_id() {
        None => PostAccess::LoginRequired,
        Some(id) if id == owner_id => PostAccess::Allowed,
        Some(_) => PostAccess::ViewOnlyFallback,
    }
}

/// Build `{login_url}?next={path_and_query}` with `/` left readable.
pub fn login_redirect_target(login_url: &str, path_and_query: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(path_and_query.as_bytes()).collect();
    let next = encoded.replace("%2F", "/");
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}next={next}")
}
