use crate::application::{
    error::{ErrorReport, HttpError},
    feed::{AuthorFeedContext, FeedContext, GroupFeedContext, PostDetailContext},
    pagination::{Page, PageWindow},
    posts::FormErrors,
};
use crate::domain::{
    entities::{CommentEntry, GroupRecord, PostEntry},
    posts::{format_human_date, label},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(layout: LayoutView) -> Response {
    let mut response = render_template_response(NotFoundTemplate { layout }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Page chrome shared by every template.
#[derive(Debug, Clone, Default)]
pub struct LayoutView {
    pub title: String,
    /// Username shown in the navigation. Always `None` on the cached global feed.
    pub viewer: Option<String>,
}

impl LayoutView {
    pub fn new(title: impl Into<String>, viewer: Option<&str>) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(str::to_string),
        }
    }

    pub fn anonymous(title: impl Into<String>) -> Self {
        Self::new(title, None)
    }
}

#[derive(Debug, Clone)]
pub struct GroupLinkView {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone)]
pub struct PostCardView {
    pub id: i64,
    pub label: String,
    pub text: String,
    pub image_url: Option<String>,
    pub author: String,
    pub author_href: String,
    pub group: Option<GroupLinkView>,
    pub published: String,
    pub iso_date: String,
    pub href: String,
}

impl From<&PostEntry> for PostCardView {
    fn from(entry: &PostEntry) -> Self {
        let post = &entry.post;
        Self {
            id: post.id,
            label: label(&post.text),
            text: post.text.clone(),
            image_url: post.image.as_deref().map(media_url),
            author: entry.author_username.clone(),
            author_href: profile_url(&entry.author_username),
            group: entry.group.as_ref().map(|group| GroupLinkView {
                title: group.title.clone(),
                href: group_url(&group.slug),
            }),
            published: format_human_date(post.created_at),
            iso_date: post.created_at.format(&Rfc3339).unwrap_or_default(),
            href: post_url(post.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub id: i64,
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
    pub delete_href: String,
    /// Only the comment author sees the delete link.
    pub can_delete: bool,
}

impl CommentView {
    pub fn new(entry: &CommentEntry, viewer: Option<&str>) -> Self {
        Self {
            can_delete: viewer == Some(entry.author_username.as_str()),
            id: entry.comment.id,
            author: entry.author_username.clone(),
            author_href: profile_url(&entry.author_username),
            text: entry.comment.text.clone(),
            published: format_human_date(entry.comment.created_at),
            delete_href: format!("/comments/{}/delete/", entry.comment.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub has_other_pages: bool,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
}

impl From<&PageWindow> for PaginatorView {
    fn from(window: &PageWindow) -> Self {
        let first_href = window.has_previous().then(|| page_href(1));
        let last_href = window.has_next().then(|| page_href(window.num_pages));
        Self {
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            start_index: window.start_index(),
            end_index: window.end_index(),
            has_other_pages: window.has_other_pages(),
            first_href,
            previous_href: window.previous_page_number().map(page_href),
            next_href: window.next_page_number().map(page_href),
            last_href,
        }
    }
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

fn cards(page: &Page<PostEntry>) -> Vec<PostCardView> {
    page.items.iter().map(PostCardView::from).collect()
}

pub fn post_url(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn group_url(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub layout: LayoutView,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
    pub post_count: u64,
}

impl IndexTemplate {
    pub fn new(context: &FeedContext) -> Self {
        Self {
            layout: LayoutView::anonymous("Latest posts"),
            posts: cards(&context.page),
            paginator: PaginatorView::from(&context.page.window),
            post_count: context.total,
        }
    }
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub layout: LayoutView,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
    pub post_count: u64,
}

impl FollowTemplate {
    pub fn new(layout: LayoutView, context: &FeedContext) -> Self {
        Self {
            layout,
            posts: cards(&context.page),
            paginator: PaginatorView::from(&context.page.window),
            post_count: context.total,
        }
    }
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub layout: LayoutView,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl GroupTemplate {
    pub fn new(viewer: Option<&str>, context: &GroupFeedContext) -> Self {
        Self {
            layout: LayoutView::new(context.group.title.clone(), viewer),
            title: context.group.title.clone(),
            slug: context.group.slug.clone(),
            description: context.group.description.clone(),
            posts: cards(&context.page),
            paginator: PaginatorView::from(&context.page.window),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub layout: LayoutView,
    pub username: String,
    pub count_post: u64,
    /// Follow controls are hidden for anonymous viewers and on one's own profile.
    pub follow_href: Option<String>,
    pub unfollow_href: Option<String>,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl ProfileTemplate {
    pub fn new(viewer: Option<&str>, context: &AuthorFeedContext) -> Self {
        let username = context.author.username.clone();
        let is_self = viewer == Some(username.as_str());
        let (follow_href, unfollow_href) = match context.following {
            None => (None, None),
            Some(_) if is_self => (None, None),
            Some(true) => (None, Some(format!("/profile/{username}/unfollow/"))),
            Some(false) => (Some(format!("/profile/{username}/follow/")), None),
        };

        Self {
            layout: LayoutView::new(format!("Posts by {username}"), viewer),
            count_post: context.total,
            follow_href,
            unfollow_href,
            posts: cards(&context.page),
            paginator: PaginatorView::from(&context.page.window),
            username,
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub layout: LayoutView,
    pub post: PostCardView,
    pub count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub edit_href: String,
    pub delete_href: String,
    pub comment_href: String,
}

impl PostDetailTemplate {
    pub fn new(viewer: Option<&str>, context: &PostDetailContext) -> Self {
        let post = PostCardView::from(&context.entry);
        let id = post.id;
        Self {
            layout: LayoutView::new(post.label.clone(), viewer),
            can_edit: viewer == Some(context.entry.author_username.as_str()),
            can_comment: viewer.is_some(),
            count: context.group_post_count,
            comments: context
                .comments
                .iter()
                .map(|comment| CommentView::new(comment, viewer))
                .collect(),
            edit_href: format!("/posts/{id}/edit/"),
            delete_href: format!("/posts/{id}/delete/"),
            comment_href: format!("/posts/{id}/comment/"),
            post,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupOptionView {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub layout: LayoutView,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub text_error: Option<String>,
    pub group_error: Option<String>,
    pub image_error: Option<String>,
}

impl PostFormTemplate {
    pub fn create(viewer: &str, groups: &[GroupRecord]) -> Self {
        Self::build(viewer, false, "/create/".to_string(), "", None, groups, None)
    }

    pub fn edit(viewer: &str, entry: &PostEntry, groups: &[GroupRecord]) -> Self {
        let selected = entry.group.as_ref().map(|group| group.slug.as_str());
        Self::build(
            viewer,
            true,
            format!("/posts/{}/edit/", entry.post.id),
            &entry.post.text,
            selected,
            groups,
            entry.post.image.as_deref(),
        )
    }

    /// Keep what the user typed and show the field errors next to it.
    pub fn with_submission(mut self, text: &str, group: Option<&str>, errors: &FormErrors) -> Self {
        self.text = text.to_string();
        for option in &mut self.groups {
            option.selected = group == Some(option.slug.as_str());
        }
        self.text_error = errors.for_field("text").map(str::to_string);
        self.group_error = errors.for_field("group").map(str::to_string);
        self.image_error = errors.for_field("image").map(str::to_string);
        self
    }

    fn build(
        viewer: &str,
        is_edit: bool,
        action: String,
        text: &str,
        selected_group: Option<&str>,
        groups: &[GroupRecord],
        current_image: Option<&str>,
    ) -> Self {
        let title = if is_edit { "Edit post" } else { "New post" };
        Self {
            layout: LayoutView::new(title, Some(viewer)),
            is_edit,
            action,
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| GroupOptionView {
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                    selected: selected_group == Some(group.slug.as_str()),
                })
                .collect(),
            current_image: current_image.map(media_url),
            text_error: None,
            group_error: None,
            image_error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub layout: LayoutView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageWindow;
    use crate::domain::entities::{GroupRef, PostRecord};
    use time::macros::datetime;

    fn entry(id: i64, text: &str) -> PostEntry {
        PostEntry {
            post: PostRecord {
                id,
                text: text.to_string(),
                image: Some("posts/2024/03/07/abc-cat.png".to_string()),
                created_at: datetime!(2024-03-07 10:00 UTC),
                author_id: 1,
                group_id: Some(4),
            },
            author_username: "leo".to_string(),
            group: Some(GroupRef {
                slug: "cats".to_string(),
                title: "Cats".to_string(),
            }),
        }
    }

    #[test]
    fn card_links_point_at_public_routes() {
        let card = PostCardView::from(&entry(7, "A rather long post about cats"));
        assert_eq!(card.href, "/posts/7/");
        assert_eq!(card.author_href, "/profile/leo/");
        assert_eq!(card.label, "A rather long p");
        assert_eq!(
            card.image_url.as_deref(),
            Some("/media/posts/2024/03/07/abc-cat.png")
        );
        assert_eq!(card.group.expect("group").href, "/group/cats/");
        assert_eq!(card.published, "7 March 2024");
    }

    #[test]
    fn paginator_on_middle_page_links_both_ways() {
        let window = PageWindow::resolve(35, Some("2"));
        let view = PaginatorView::from(&window);
        assert_eq!(view.previous_href.as_deref(), Some("?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("?page=3"));
        assert_eq!(view.last_href.as_deref(), Some("?page=4"));
        assert_eq!((view.start_index, view.end_index), (11, 20));
    }

    #[test]
    fn single_page_has_no_links() {
        let view = PaginatorView::from(&PageWindow::resolve(3, None));
        assert!(!view.has_other_pages);
        assert!(view.previous_href.is_none());
        assert!(view.next_href.is_none());
    }

    #[test]
    fn index_template_never_names_a_viewer() {
        let window = PageWindow::resolve(1, None);
        let context = FeedContext {
            page: Page::new(vec![entry(1, "hello")], window),
            total: 1,
        };
        let template = IndexTemplate::new(&context);
        assert!(template.layout.viewer.is_none());
        let html = template.render().expect("render");
        assert!(html.contains("/posts/1/"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn form_keeps_submission_and_errors() {
        let groups = vec![GroupRecord {
            id: 1,
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        }];
        let mut errors = FormErrors::default();
        errors.push("text", "This field is required.");
        let form = PostFormTemplate::create("leo", &groups).with_submission(
            "  ",
            Some("cats"),
            &errors,
        );
        assert_eq!(form.text_error.as_deref(), Some("This field is required."));
        assert!(form.groups[0].selected);
        let html = form.render().expect("render");
        assert!(html.contains("This field is required."));
    }
}
