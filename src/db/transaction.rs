use std::{future::Future, pin::Pin};

use tracing::{debug, error, warn};

use super::{Database, TxHandle};
use crate::error::{AppError, AppResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs `f` inside a transaction: commit on success, rollback on failure.
///
/// `f`'s result reaches the caller only after a successful commit. A failed rollback
/// is reported together with the error that triggered it.
pub async fn run_in_transaction<D, T, F>(db: &D, f: F) -> AppResult<T>
where
    D: Database,
    T: Send,
    F: for<'t> FnOnce(&'t mut D::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut tx = db.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await.map_err(|e| {
                error!(error = %e, "commit failed");
                AppError::Storage(e)
            })?;
            Ok(result)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => {
                if err.is_domain() {
                    debug!(error = %err, "transaction rolled back");
                } else {
                    warn!(error = %err, "transaction rolled back");
                }
                Err(err)
            }
            Err(rollback) => {
                error!(error = %err, rollback_error = %rollback, "rollback failed");
                Err(AppError::Rollback {
                    source: Box::new(err),
                    rollback,
                })
            }
        },
    }
}
