//! Commit-or-rollback wrapper around [`CacheTransaction`]

use futures::future::BoxFuture;
use std::fmt::Display;
use tracing::{debug, error};

use super::traits::{CacheTransaction, StreamCache};

/// Run `work` inside a transaction.
///
/// Commits when `work` succeeds and rolls back when it fails. Failures at any
/// step (begin, work, commit) are logged and reported as `None` so callers
/// keep whatever they already had.
pub async fn run_transaction<T, E, F>(cache: &dyn StreamCache, context: &str, work: F) -> Option<T>
where
    E: Display,
    F: for<'t> FnOnce(&'t mut dyn CacheTransaction) -> BoxFuture<'t, Result<T, E>>,
{
    let mut tx = match cache.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("[{}] Failed to open transaction: {}", context, e);
            return None;
        }
    };

    match work(&mut *tx).await {
        Ok(value) => match tx.commit().await {
            Ok(()) => {
                debug!("[{}] Transaction committed", context);
                Some(value)
            }
            Err(e) => {
                error!("[{}] Failed to commit transaction: {}", context, e);
                None
            }
        },
        Err(e) => {
            error!("[{}] Transaction failed, rolling back: {}", context, e);
            if let Err(rollback_error) = tx.rollback().await {
                error!("[{}] Rollback failed: {}", context, rollback_error);
            }
            None
        }
    }
}
