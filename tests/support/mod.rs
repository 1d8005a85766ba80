#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderName, Request, header::CONTENT_TYPE},
    response::Response,
};
use quillpost::{
    application::{
        feed::FeedService,
        follow::FollowService,
        pagination::PageRequest,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, FollowsRepo,
            GroupsRepo, HealthRepo, PostFilter, PostsRepo, PostsWriteRepo, RepoError,
            UpdatePostParams, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    config::AuthSettings,
    domain::entities::{
        CommentEntry, CommentRecord, GroupRecord, GroupRef, PostEntry, PostRecord, UserRecord,
    },
    infra::{
        http::{AdminState, HttpState, build_admin_router, build_router},
        uploads::UploadStorage,
    },
};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;

pub const USER_HEADER: &str = "x-authenticated-user";
pub const BOUNDARY: &str = "quillpost-test-boundary";

pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
    next_id: i64,
    ticks: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so ordering is deterministic.
    fn now(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        datetime!(2024-01-01 00:00 UTC) + Duration::seconds(self.ticks)
    }

    fn entry(&self, post: &PostRecord) -> Option<PostEntry> {
        let author = self.users.iter().find(|user| user.id == post.author_id)?;
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        Some(PostEntry {
            post: post.clone(),
            author_username: author.username.clone(),
            group,
        })
    }

    fn matches(&self, post: &PostRecord, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|(follower, author)| *follower == user_id && *author == post.author_id),
        }
    }
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.lock();
        let user = UserRecord {
            id: tables.next_id(),
            username: username.to_string(),
            created_at: tables.now(),
        };
        tables.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.lock();
        let group = GroupRecord {
            id: tables.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn add_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        let mut tables = self.lock();
        let post = PostRecord {
            id: tables.next_id(),
            text: text.to_string(),
            image: None,
            created_at: tables.now(),
            author_id: author.id,
            group_id: group.map(|group| group.id),
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn add_comment(&self, author: &UserRecord, post: &PostRecord, text: &str) -> CommentRecord {
        let mut tables = self.lock();
        let comment = CommentRecord {
            id: tables.next_id(),
            text: text.to_string(),
            created_at: tables.now(),
            post_id: post.id,
            author_id: author.id,
        };
        tables.comments.push(comment.clone());
        comment
    }

    pub fn remove_post(&self, id: i64) {
        let mut tables = self.lock();
        tables.posts.retain(|post| post.id != id);
        tables.comments.retain(|comment| comment.post_id != id);
    }

    pub fn post(&self, id: i64) -> Option<PostRecord> {
        self.lock().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.lock().posts.clone()
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.lock().comments.clone()
    }

    pub fn follow_rows(&self) -> Vec<(i64, i64)> {
        self.lock().follows.clone()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        if self.lock().users.iter().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        Ok(self.add_user(username))
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.lock();
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: tables.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostEntry>, RepoError> {
        let tables = self.lock();
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| tables.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|post| tables.entry(post))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .filter(|post| tables.matches(post, filter))
            .count() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostEntry>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| tables.entry(post)))
    }

    async fn count_in_group(&self, group_id: Option<i64>) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .posts
            .iter()
            .filter(|post| post.group_id == group_id)
            .count() as u64)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = PostRecord {
            id: tables.next_id(),
            text: params.text,
            image: params.image,
            created_at: tables.now(),
            author_id: params.author_id,
            group_id: params.group_id,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        if self.post(id).is_none() {
            return Err(RepoError::NotFound);
        }
        self.remove_post(id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentEntry>, RepoError> {
        let tables = self.lock();
        let mut comments: Vec<CommentEntry> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .filter_map(|comment| {
                let author = tables.users.iter().find(|user| user.id == comment.author_id)?;
                Some(CommentEntry {
                    comment: comment.clone(),
                    author_username: author.username.clone(),
                })
            })
            .collect();
        comments.sort_by(|a, b| {
            a.comment
                .created_at
                .cmp(&b.comment.created_at)
                .then(a.comment.id.cmp(&b.comment.id))
        });
        Ok(comments)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self
            .lock()
            .comments
            .iter()
            .find(|comment| comment.id == id)
            .cloned())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        if !tables.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "post does not exist".to_string(),
            });
        }
        let comment = CommentRecord {
            id: tables.next_id(),
            text: params.text,
            created_at: tables.now(),
            post_id: params.post_id,
            author_id: params.author_id,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError> {
        self.lock().comments.retain(|comment| comment.id != id);
        Ok(())
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        let mut tables = self.lock();
        if tables.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(tables.follows.len() != before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user_id, author_id)))
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub admin: Router,
    pub store: Arc<MemoryStore>,
    pub uploads: Arc<UploadStorage>,
    _upload_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let upload_dir = tempfile::tempdir().expect("tempdir");
        let uploads =
            Arc::new(UploadStorage::new(upload_dir.path().to_path_buf()).expect("upload storage"));
        let cache = config.enabled.then(|| CacheState::new(config));

        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            uploads.clone(),
        ));
        let follows = Arc::new(FollowService::new(store.clone(), store.clone()));

        let state = HttpState {
            feed,
            posts,
            follows,
            users: store.clone(),
            health: store.clone(),
            upload_storage: uploads.clone(),
            cache: cache.clone(),
            auth: AuthSettings {
                user_header: HeaderName::from_static(USER_HEADER),
                login_url: "/auth/login/".to_string(),
            },
            upload_limit_bytes: 1024 * 1024,
        };
        let admin = build_admin_router(AdminState {
            health: store.clone(),
            cache,
        });

        Self {
            router: build_router(state),
            admin,
            store,
            uploads,
            _upload_dir: upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Response {
        self.send(request("GET", uri, user).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, user: Option<&str>, body: &str) -> Response {
        self.send(
            request("POST", uri, user)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        user: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> Response {
        self.send(
            request("POST", uri, user)
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(fields, image)))
                .expect("request"),
        )
        .await
    }

    pub async fn admin_post(&self, uri: &str) -> Response {
        self.admin
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
    }
}

fn request(method: &str, uri: &str, user: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match user {
        Some(user) => builder.header(USER_HEADER, user),
        None => builder,
    }
}

pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn card_count(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}

/// Post ids in the order their cards appear.
pub fn card_ids(html: &str) -> Vec<i64> {
    html.split("id=\"post-")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .filter_map(|id| id.parse().ok())
        .collect()
}
