//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::UserRepository;
use crate::domain::{CustomError, ErrorKind, User, UserDraft, UserId};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error, with_query_timeout};
use super::models::{NewUserRow, UserRow, UserUpdate};
use super::pool::DbPool;
use super::schema::users;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Diesel-backed implementation of the user repository port.
///
/// Every query, including connection checkout, runs under the query timeout
/// so a stalled database surfaces as `Timeout` instead of hanging a worker.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
    query_timeout: Duration,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the per-query deadline.
    #[must_use]
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn list(&self) -> Result<Vec<User>, CustomError> {
        let rows = with_query_timeout(self.query_timeout, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            users::table
                .select(UserRow::as_select())
                .order(users::id.asc())
                .load::<UserRow>(&mut conn)
                .await
                .map_err(map_diesel_error)
        })
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn create(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError> {
        let new_row = NewUserRow {
            id: *id.as_uuid(),
            name: draft.name(),
            email: draft.email(),
        };
        let row = with_query_timeout(self.query_timeout, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::insert_into(users::table)
                .values(&new_row)
                .returning(UserRow::as_returning())
                .get_result::<UserRow>(&mut conn)
                .await
                .map_err(map_diesel_error)
        })
        .await?;
        Ok(User::from(row))
    }

    async fn get(&self, id: UserId) -> Result<User, CustomError> {
        let row = with_query_timeout(self.query_timeout, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            users::table
                .find(*id.as_uuid())
                .select(UserRow::as_select())
                .first::<UserRow>(&mut conn)
                .await
                .map_err(map_diesel_error)
        })
        .await?;
        Ok(User::from(row))
    }

    async fn update(&self, id: UserId, draft: &UserDraft) -> Result<User, CustomError> {
        let changes = UserUpdate {
            name: draft.name(),
            email: draft.email(),
            updated_at: Utc::now(),
        };
        let row = with_query_timeout(self.query_timeout, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::update(users::table.find(*id.as_uuid()))
                .set(&changes)
                .returning(UserRow::as_returning())
                .get_result::<UserRow>(&mut conn)
                .await
                .map_err(map_diesel_error)
        })
        .await?;
        Ok(User::from(row))
    }

    async fn delete(&self, id: UserId) -> Result<(), CustomError> {
        let affected = with_query_timeout(self.query_timeout, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::delete(users::table.find(*id.as_uuid()))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)
        })
        .await?;

        match affected {
            1 => Ok(()),
            0 => Err(ErrorKind::DbNotFound
                .new()
                .append_message(format_args!("no user with id {id}"))),
            n => Err(ErrorKind::DbOperation
                .new()
                .append_message(format_args!("delete removed {n} rows for id {id}"))),
        }
    }
}
