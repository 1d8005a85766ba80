//! Follow graph operations.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        actor: &UserRecord,
        target_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let target = self.resolve(target_username).await?;
        if target.id == actor.id {
            info!(
                target = "quillpost::application::follow",
                user = %actor.username,
                "self-follow rejected"
            );
            return Ok(FollowOutcome::SelfFollowRejected);
        }

        let outcome = if self.follows.insert_follow(actor.id, target.id).await? {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };

        info!(
            target = "quillpost::application::follow",
            user = %actor.username,
            author = %target.username,
            outcome = ?outcome,
            "follow requested"
        );
        Ok(outcome)
    }

    pub async fn unfollow(
        &self,
        actor: &UserRecord,
        target_username: &str,
    ) -> Result<UnfollowOutcome, FollowError> {
        let target = self.resolve(target_username).await?;

        let outcome = if self.follows.delete_follow(actor.id, target.id).await? {
            UnfollowOutcome::Removed
        } else {
            UnfollowOutcome::NotFollowing
        };

        info!(
            target = "quillpost::application::follow",
            user = %actor.username,
            author = %target.username,
            outcome = ?outcome,
            "unfollow requested"
        );
        Ok(outcome)
    }

    pub async fn is_following(&self, actor_id: i64, author_id: i64) -> Result<bool, FollowError> {
        Ok(self.follows.is_following(actor_id, author_id).await?)
    }

    async fn resolve(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
