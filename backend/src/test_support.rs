//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and when the `test-support` feature is enabled.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::ports::UserRepository;
use crate::domain::{CustomError, ErrorKind, User, UserDraft, UserId};

/// In-memory [`UserRepository`] with the storage rules of the database:
/// emails are unique and missing rows are `DbNotFound`.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    rows: Mutex<BTreeMap<UserId, User>>,
}

impl InMemoryUserRepository {
    fn rows(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<UserId, User>>, CustomError> {
        self.rows
            .lock()
            .map_err(|_| ErrorKind::DbOperation.new().with_message("user store poisoned"))
    }

    fn not_found(id: UserId) -> CustomError {
        ErrorKind::DbNotFound
            .new()
            .append_message(format_args!("no user with id {id}"))
    }

    fn email_taken(rows: &BTreeMap<UserId, User>, email: &str, except: Option<UserId>) -> bool {
        rows.values()
            .any(|user| user.email == email && Some(user.id) != except)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self) -> Result<Vec<User>, CustomError> {
        Ok(self.rows()?.values().cloned().collect())
    }

    async fn create(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError> {
        let mut rows = self.rows()?;
        if rows.contains_key(&id) || Self::email_taken(&rows, draft.email(), None) {
            return Err(ErrorKind::DbDuplicate
                .new()
                .append_message(format_args!("users_email_key: {}", draft.email())));
        }
        let now = Utc::now();
        let user = User {
            id,
            name: draft.name().to_owned(),
            email: draft.email().to_owned(),
            created_at: now,
            updated_at: now,
        };
        rows.insert(id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: UserId) -> Result<User, CustomError> {
        self.rows()?
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError> {
        let mut rows = self.rows()?;
        if Self::email_taken(&rows, draft.email(), Some(id)) {
            return Err(ErrorKind::DbDuplicate
                .new()
                .append_message(format_args!("users_email_key: {}", draft.email())));
        }
        let user = rows.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        user.name = draft.name().to_owned();
        user.email = draft.email().to_owned();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), CustomError> {
        self.rows()?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }
}
