//! Post and comment commands issued by authenticated users.
//!
//! Ownership is decided by [`crate::application::access`] before these
//! commands run; the service only validates input and persists it.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::application::uploads::{ImageStore, StoredUpload, UploadStorageError};
use crate::domain::entities::{CommentRecord, GroupRecord, PostEntry, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::images::inspect_image;
use crate::domain::posts::{CommentDraft, PostDraft};

const SOURCE: &str = "quillpost::application::posts";

/// Raw post form submission, as decoded from the multipart body.
#[derive(Debug, Clone, Default)]
pub struct PostFormInput {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field-level validation failures shown next to the form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    fn from_domain(error: DomainError) -> Self {
        let mut errors = Self::default();
        let DomainError::Validation { field, message } = error;
        errors.push(field, message);
        errors
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PostCommandError {
    #[error("form is invalid: {0}")]
    Invalid(FormErrors),
    #[error("unknown post")]
    UnknownPost,
    #[error("unknown comment")]
    UnknownComment,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    uploads: Arc<dyn ImageStore>,
}

struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        uploads: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            comments,
            uploads,
        }
    }

    /// Groups offered in the post form.
    pub async fn groups(&self) -> Result<Vec<GroupRecord>, PostCommandError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find_post(&self, id: i64) -> Result<PostEntry, PostCommandError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(PostCommandError::UnknownPost)
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        input: PostFormInput,
    ) -> Result<PostRecord, PostCommandError> {
        let mut errors = FormErrors::default();
        let validated = self.validate_post(&input, &mut errors).await?;
        let image = validate_image(input.image, &mut errors);
        let validated = match validated {
            Some(validated) if errors.is_empty() => validated,
            _ => return Err(PostCommandError::Invalid(errors)),
        };

        let stored = match image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let params = CreatePostParams {
            author_id: author.id,
            text: validated.text,
            group_id: validated.group_id,
            image: stored.as_ref().map(|stored| stored.stored_path.clone()),
        };

        let post = match self.writer.create_post(params).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(stored.as_ref()).await;
                return Err(err.into());
            }
        };

        info!(
            target = SOURCE,
            post_id = post.id,
            author = %author.username,
            has_image = post.image.is_some(),
            "post created"
        );
        Ok(post)
    }

    /// Apply an edit to `existing`. The caller has already checked authorship.
    pub async fn update_post(
        &self,
        existing: &PostEntry,
        input: PostFormInput,
    ) -> Result<PostRecord, PostCommandError> {
        let mut errors = FormErrors::default();
        let validated = self.validate_post(&input, &mut errors).await?;
        if input.clear_image && input.image.is_some() {
            errors.push(
                "image",
                "Please either submit a file or check the clear checkbox, not both.",
            );
        }
        let image = validate_image(input.image, &mut errors);
        let validated = match validated {
            Some(validated) if errors.is_empty() => validated,
            _ => return Err(PostCommandError::Invalid(errors)),
        };

        let previous_image = existing.post.image.clone();
        let stored = match image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };
        let next_image = match (&stored, input.clear_image) {
            (Some(stored), _) => Some(stored.stored_path.clone()),
            (None, true) => None,
            (None, false) => previous_image.clone(),
        };

        let params = UpdatePostParams {
            id: existing.post.id,
            text: validated.text,
            group_id: validated.group_id,
            image: next_image.clone(),
        };

        let post = match self.writer.update_post(params).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(stored.as_ref()).await;
                return Err(err.into());
            }
        };

        if let Some(previous) = previous_image
            && next_image.as_deref() != Some(previous.as_str())
        {
            self.remove_file(&previous).await;
        }

        info!(target = SOURCE, post_id = post.id, "post updated");
        Ok(post)
    }

    /// Delete `existing` and its image. The caller has already checked authorship.
    pub async fn delete_post(&self, existing: &PostEntry) -> Result<(), PostCommandError> {
        self.writer.delete_post(existing.post.id).await?;
        if let Some(image) = existing.post.image.as_deref() {
            self.remove_file(image).await;
        }
        info!(
            target = SOURCE,
            post_id = existing.post.id,
            "post deleted"
        );
        Ok(())
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostCommandError> {
        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(PostCommandError::UnknownPost);
        }

        let draft = CommentDraft::parse(text)
            .map_err(|err| PostCommandError::Invalid(FormErrors::from_domain(err)))?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text: draft.text,
            })
            .await?;

        info!(
            target = SOURCE,
            post_id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }

    pub async fn find_comment(&self, id: i64) -> Result<CommentRecord, PostCommandError> {
        self.comments
            .find_by_id(id)
            .await?
            .ok_or(PostCommandError::UnknownComment)
    }

    /// Delete `comment`. The caller has already checked authorship.
    pub async fn delete_comment(&self, comment: &CommentRecord) -> Result<(), PostCommandError> {
        self.comments.delete_comment(comment.id).await?;
        info!(
            target = SOURCE,
            post_id = comment.post_id,
            comment_id = comment.id,
            "comment deleted"
        );
        Ok(())
    }

    async fn validate_post(
        &self,
        input: &PostFormInput,
        errors: &mut FormErrors,
    ) -> Result<Option<ValidatedPost>, PostCommandError> {
        let draft = match PostDraft::parse(&input.text, input.group.as_deref()) {
            Ok(draft) => draft,
            Err(err) => {
                for error in FormErrors::from_domain(err).iter() {
                    errors.push(error.field, error.message.clone());
                }
                return Ok(None);
            }
        };

        let group_id = match draft.group_slug.as_deref() {
            None => None,
            Some(slug) => match self.groups.find_by_slug(slug).await? {
                Some(group) => Some(group.id),
                None => {
                    errors.push(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    return Ok(None);
                }
            },
        };

        Ok(Some(ValidatedPost {
            text: draft.text,
            group_id,
        }))
    }

    async fn store_image(&self, upload: ImageUpload) -> Result<StoredUpload, PostCommandError> {
        let stored = self.uploads.store_image(&upload.filename, upload.data).await?;
        info!(
            target = SOURCE,
            path = %stored.stored_path,
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            "post image stored"
        );
        Ok(stored)
    }

    async fn discard_image(&self, stored: Option<&StoredUpload>) {
        if let Some(stored) = stored {
            self.remove_file(&stored.stored_path).await;
        }
    }

    async fn remove_file(&self, stored_path: &str) {
        if let Err(err) = self.uploads.delete(stored_path).await {
            warn!(
                target = SOURCE,
                path = %stored_path,
                error = %err,
                "failed to remove stored image"
            );
        }
    }
}

/// An empty file input is not an upload. Anything else must decode as an image.
fn validate_image(upload: Option<ImageUpload>, errors: &mut FormErrors) -> Option<ImageUpload> {
    let upload = upload.filter(|upload| !upload.data.is_empty() || !upload.filename.is_empty())?;
    if upload.data.is_empty() {
        errors.push("image", "The submitted file is empty.");
        return None;
    }
    if inspect_image(&upload.data).is_err() {
        errors.push(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        );
        return None;
    }
    Some(upload)
}
