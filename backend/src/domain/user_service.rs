//! User operations: the layer between HTTP handlers and the repository port.
//!
//! The service owns identifier generation and email normalisation so every
//! adapter sees the same contract. Errors from the repository are already
//! classified; the service only adds a checkpoint naming the operation.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::UserRepository;
use crate::domain::{CustomError, User, UserDraft, UserId};

/// Use-cases over the user entity.
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    /// Build the service over a repository adapter.
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// All users, oldest first.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub async fn list(&self) -> Result<Vec<User>, CustomError> {
        self.repository
            .list()
            .await
            .map_err(|err| err.checkpoint("list users"))
    }

    /// Create a user under a freshly generated UUIDv7.
    ///
    /// # Errors
    /// `DbDuplicate` when the email is taken; other repository failures as
    /// classified by the adapter.
    pub async fn create(&self, draft: UserDraft) -> Result<User, CustomError> {
        let id = UserId::generate();
        debug!(user_id = %id, "creating user");
        self.repository
            .create(id, &draft)
            .await
            .map_err(|err| err.checkpoint("create user"))
    }

    /// Fetch a user by identifier.
    ///
    /// # Errors
    /// `DbNotFound` when no row matches.
    pub async fn get(&self, id: UserId) -> Result<User, CustomError> {
        self.repository
            .get(id)
            .await
            .map_err(|err| err.checkpoint("get user"))
    }

    /// Replace a user's name and email.
    ///
    /// # Errors
    /// `DbNotFound` when no row matches, `DbDuplicate` when the new email is
    /// taken.
    pub async fn update(&self, id: UserId, draft: UserDraft) -> Result<User, CustomError> {
        self.repository
            .update(id, &draft)
            .await
            .map_err(|err| err.checkpoint("update user"))
    }

    /// Delete a user.
    ///
    /// # Errors
    /// `DbNotFound` when no row was removed.
    pub async fn delete(&self, id: UserId) -> Result<(), CustomError> {
        self.repository
            .delete(id)
            .await
            .map_err(|err| err.checkpoint("delete user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::domain::ports::MockUserRepository;
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use rstest::rstest;

    fn stored(id: UserId, draft: &UserDraft) -> User {
        let now = Utc::now();
        User {
            id,
            name: draft.name().to_owned(),
            email: draft.email().to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn create_generates_a_v7_identifier() {
        let mut repository = MockUserRepository::new();
        repository
            .expect_create()
            .with(always(), always())
            .times(1)
            .returning(|id, draft| Ok(stored(id, draft)));
        let service = UserService::new(Arc::new(repository));

        let user = service
            .create(UserDraft::new("Ada", "Ada@Example.com"))
            .await
            .expect("created");

        assert_eq!(user.id.as_uuid().get_version_num(), 7);
        assert_eq!(user.email, "ada@example.com");
    }

    #[rstest]
    #[tokio::test]
    async fn repository_errors_keep_their_kind_and_gain_a_checkpoint() {
        let id = UserId::generate();
        let mut repository = MockUserRepository::new();
        repository
            .expect_get()
            .with(eq(id))
            .returning(|_| Err(ErrorKind::DbNotFound.new()));
        let service = UserService::new(Arc::new(repository));

        let err = service.get(id).await.expect_err("missing user");

        assert_eq!(err.kind(), ErrorKind::DbNotFound);
        let checkpoints: Vec<_> = err
            .checkpoints()
            .iter()
            .map(|checkpoint| checkpoint.message.as_str())
            .collect();
        assert_eq!(checkpoints, ["get user"]);
    }

    #[rstest]
    #[tokio::test]
    async fn delete_passes_not_found_through() {
        let mut repository = MockUserRepository::new();
        repository
            .expect_delete()
            .returning(|_| Err(ErrorKind::DbNotFound.new()));
        let service = UserService::new(Arc::new(repository));

        let err = service
            .delete(UserId::generate())
            .await
            .expect_err("nothing deleted");
        assert_eq!(err.kind(), ErrorKind::DbNotFound);
    }
}
