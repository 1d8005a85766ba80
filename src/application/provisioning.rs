//! Operator commands that seed users and groups.

use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError, UsersRepo};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::slug::{MAX_TITLE_LEN, derive_slug, validate_slug};

const SOURCE: &str = "quillpost::application::provisioning";
pub const MAX_USERNAME_LEN: usize = 150;

#[derive(Clone)]
pub struct ProvisioningService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl ProvisioningService {
    pub fn new(users: Arc<dyn UsersRepo>, groups: Arc<dyn GroupsRepo>) -> Self {
        Self { users, groups }
    }

    pub async fn create_user(&self, username: &str) -> Result<UserRecord, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username", "This field is required.").into());
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(DomainError::validation(
                "username",
                format!("Ensure this value has at most {MAX_USERNAME_LEN} characters."),
            )
            .into());
        }

        let user = self
            .users
            .create_user(username)
            .await
            .map_err(|err| duplicate_as_validation(err, "username", username))?;
        info!(target = SOURCE, user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Create a group; without an explicit slug one is derived from the title.
    pub async fn create_group(
        &self,
        title: &str,
        slug: Option<&str>,
        description: &str,
    ) -> Result<GroupRecord, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title", "This field is required.").into());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::validation(
                "title",
                format!("Ensure this value has at most {MAX_TITLE_LEN} characters."),
            )
            .into());
        }

        let slug = match slug.map(str::trim).filter(|value| !value.is_empty()) {
            Some(slug) => {
                validate_slug(slug)
                    .map_err(|err| DomainError::validation("slug", err.to_string()))?;
                slug.to_string()
            }
            None => derive_slug(title).map_err(|err| DomainError::validation("slug", err.to_string()))?,
        };

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.clone(),
                description: description.trim().to_string(),
            })
            .await
            .map_err(|err| duplicate_as_validation(err, "slug", &slug))?;
        info!(target = SOURCE, group_id = group.id, slug = %group.slug, "group created");
        Ok(group)
    }
}

fn duplicate_as_validation(err: RepoError, field: &'static str, value: &str) -> AppError {
    match err {
        RepoError::Duplicate { .. } => {
            DomainError::validation(field, format!("`{value}` is already taken.")).into()
        }
        other => other.into(),
    }
}
