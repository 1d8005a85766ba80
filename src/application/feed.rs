use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::access::Viewer;
use crate::application::pagination::{Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentEntry, GroupRecord, PostEntry, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Global feed and follow feed content.
#[derive(Debug, Clone)]
pub struct FeedContext {
    pub page: Page<PostEntry>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct GroupFeedContext {
    pub group: GroupRecord,
    pub page: Page<PostEntry>,
}

#[derive(Debug, Clone)]
pub struct AuthorFeedContext {
    pub author: UserRecord,
    pub page: Page<PostEntry>,
    pub total: u64,
    /// `None` for anonymous viewers.
    pub following: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PostDetailContext {
    pub entry: PostEntry,
    pub comments: Vec<CommentEntry>,
    pub group_post_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
        }
    }

    pub async fn global_feed(&self, raw_page: Option<&str>) -> Result<FeedContext, FeedError> {
        let page = self.load_page(PostFilter::All, raw_page).await?;
        Ok(FeedContext {
            total: page.window.count,
            page,
        })
    }

    pub async fn group_feed(
        &self,
        slug: &str,
        raw_page: Option<&str>,
    ) -> Result<GroupFeedContext, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;
        let page = self.load_page(PostFilter::Group(group.id), raw_page).await?;
        Ok(GroupFeedContext { group, page })
    }

    pub async fn author_feed(
        &self,
        username: &str,
        viewer: &Viewer,
        raw_page: Option<&str>,
    ) -> Result<AuthorFeedContext, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;

        let following = match viewer.user_id() {
            Some(viewer_id) => Some(self.follows.is_following(viewer_id, author.id).await?),
            None => None,
        };

        let page = self.load_page(PostFilter::Author(author.id), raw_page).await?;
        Ok(AuthorFeedContext {
            total: page.window.count,
            author,
            page,
            following,
        })
    }

    /// Posts by every author `viewer_id` follows.
    pub async fn follow_feed(
        &self,
        viewer_id: i64,
        raw_page: Option<&str>,
    ) -> Result<FeedContext, FeedError> {
        let page = self
            .load_page(PostFilter::FollowedBy(viewer_id), raw_page)
            .await?;
        Ok(FeedContext {
            total: page.window.count,
            page,
        })
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetailContext, FeedError> {
        let entry = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(FeedError::UnknownPost)?;
        let comments = self.comments.list_for_post(post_id).await?;
        let group_post_count = self.posts.count_in_group(entry.post.group_id).await?;

        Ok(PostDetailContext {
            entry,
            comments,
            group_post_count,
        })
    }

    async fn load_page(
        &self,
        filter: PostFilter,
        raw_page: Option<&str>,
    ) -> Result<Page<PostEntry>, FeedError> {
        let count = self.posts.count_posts(filter).await?;
        let window = PageWindow::resolve(count, raw_page);
        let items = self.posts.list_posts(filter, window.request()).await?;

        debug!(
            target = "quillpost::application::feed",
            filter = ?filter,
            page = window.number,
            num_pages = window.num_pages,
            items = items.len(),
            "feed page loaded"
        );

        Ok(Page::new(items, window))
    }
}
