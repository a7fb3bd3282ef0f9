//! Classification of Diesel and pool failures into the error taxonomy.
//!
//! Repositories call these at the point of failure so the driver error is
//! retained as the cause and the HTTP layer never re-classifies.

use std::future::Future;
use std::time::Duration;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::{CustomError, ErrorKind};

use super::pool::PoolError;

/// Pick the kind for a Diesel error.
pub(crate) fn classify(error: &DieselError) -> ErrorKind {
    match error {
        DieselError::NotFound => ErrorKind::DbNotFound,
        DieselError::DatabaseError(kind, _) => match kind {
            DatabaseErrorKind::UniqueViolation => ErrorKind::DbDuplicate,
            DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation => ErrorKind::DbConstraint,
            DatabaseErrorKind::ClosedConnection => ErrorKind::DbConnection,
            _ => ErrorKind::DbOperation,
        },
        _ => ErrorKind::DbOperation,
    }
}

/// Wrap a Diesel error in its classified kind, keeping it as the cause.
pub(crate) fn map_diesel_error(error: DieselError) -> CustomError {
    let kind = classify(&error);
    match &error {
        DieselError::DatabaseError(db_kind, info) => debug!(
            ?db_kind,
            message = info.message(),
            constraint = info.constraint_name(),
            code = kind.code(),
            "diesel operation failed"
        ),
        _ => debug!(error = %error, code = kind.code(), "diesel operation failed"),
    }
    kind.new().with_cause(error)
}

/// Pool checkout failures are connection failures.
pub(crate) fn map_pool_error(error: PoolError) -> CustomError {
    ErrorKind::DbConnection.new().with_cause(error)
}

/// Run a query future under `limit`, mapping expiry to `Timeout`.
pub(crate) async fn with_query_timeout<T, F>(limit: Duration, fut: F) -> Result<T, CustomError>
where
    F: Future<Output = Result<T, CustomError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(ErrorKind::Timeout
            .new()
            .with_cause(elapsed)
            .append_message(format_args!("query exceeded {}ms", limit.as_millis()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn database_error(kind: DatabaseErrorKind) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(String::from("driver detail")))
    }

    #[rstest]
    #[case(database_error(DatabaseErrorKind::UniqueViolation), ErrorKind::DbDuplicate)]
    #[case(database_error(DatabaseErrorKind::ForeignKeyViolation), ErrorKind::DbConstraint)]
    #[case(database_error(DatabaseErrorKind::CheckViolation), ErrorKind::DbConstraint)]
    #[case(database_error(DatabaseErrorKind::NotNullViolation), ErrorKind::DbConstraint)]
    #[case(database_error(DatabaseErrorKind::ClosedConnection), ErrorKind::DbConnection)]
    #[case(database_error(DatabaseErrorKind::SerializationFailure), ErrorKind::DbOperation)]
    #[case(DieselError::NotFound, ErrorKind::DbNotFound)]
    #[case(DieselError::RollbackTransaction, ErrorKind::DbOperation)]
    fn classifies_driver_errors(#[case] error: DieselError, #[case] expected: ErrorKind) {
        assert_eq!(classify(&error), expected);
    }

    #[rstest]
    fn mapped_errors_keep_the_driver_error_as_cause() {
        let err = map_diesel_error(database_error(DatabaseErrorKind::UniqueViolation));
        assert_eq!(err.kind(), ErrorKind::DbDuplicate);
        assert!(err.find_cause::<DieselError>().is_some());
        assert_eq!(err.detail(), "duplicate record detected in database");
    }

    #[rstest]
    fn pool_errors_are_connection_failures() {
        let err = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(err.kind(), ErrorKind::DbConnection);
        assert_eq!(
            err.find_cause::<PoolError>(),
            Some(&PoolError::checkout("timed out"))
        );
    }

    #[tokio::test]
    async fn slow_queries_time_out() {
        let result: Result<(), CustomError> = with_query_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.expect_err("query should time out");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
