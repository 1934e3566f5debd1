//! Per-operation deadlines.
//!
//! Every store call runs under [`bounded`]. When the deadline passes the
//! in-flight future is dropped, which cancels the database call, and the
//! caller gets `DbError::Timeout`.

use std::future::Future;
use std::time::Duration;

use crate::error::{DbError, DbResult};

/// Default deadline for a single store operation.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Runs `fut` with a deadline.
///
/// ## Arguments
/// * `limit` - deadline for this call only
/// * `operation` - name reported in `DbError::Timeout` (e.g. `"users.update"`)
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(DbError::Timeout { operation }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = bounded(Duration::from_secs(1), "noop", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_times_out() {
        let result: DbResult<()> = bounded(Duration::from_millis(10), "slow.op", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(DbError::Timeout { operation }) => assert_eq!(operation, "slow.op"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: DbResult<()> =
            bounded(Duration::from_secs(1), "x", async { Err(DbError::not_found("User")) }).await;
        assert!(matches!(result, Err(DbError::NotFound { entity: "User" })));
    }
}
