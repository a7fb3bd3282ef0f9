//! Port abstraction for user persistence adapters.
//!
//! Adapters classify their failures into [`CustomError`] at the point of
//! failure, keeping the driver error as the cause.

use async_trait::async_trait;

use crate::domain::{CustomError, User, UserDraft, UserId};

#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every stored user in identifier order.
    async fn list(&self) -> Result<Vec<User>, CustomError>;

    /// Insert a user under a caller-supplied identifier.
    ///
    /// Unique-constraint violations surface as `DbDuplicate`.
    async fn create(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError>;

    /// Fetch one user; a missing row is `DbNotFound`.
    async fn get(&self, id: UserId) -> Result<User, CustomError>;

    /// Replace name and email; a missing row is `DbNotFound`.
    async fn update(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError>;

    /// Remove exactly one user; zero affected rows is `DbNotFound`.
    async fn delete(&self, id: UserId) -> Result<(), CustomError>;
}
