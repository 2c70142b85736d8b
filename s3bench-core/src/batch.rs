//! Task group running the concurrent operations of one batch.

use std::future::Future;

use tokio::task::JoinSet;

use crate::driver::Operation;
use crate::error::{Error, Result};
use crate::storage::StorageResult;
use crate::sweep::BatchParams;

/// Spawns `params.workers` operations created by `operation_fn` and waits for all of them.
///
/// Returns the total number of bytes transferred. The first failing operation fails the batch;
/// the remaining operations are aborted when the task set is dropped.
pub(crate) async fn run<F, Fut>(
    operation: Operation,
    params: &BatchParams,
    mut operation_fn: F,
) -> Result<u64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<u64>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for _ in 0..params.workers {
        tasks.spawn(operation_fn());
    }

    let mut transferred = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(bytes) => transferred += bytes,
            Err(source) => {
                return Err(Error::Batch {
                    operation,
                    workers: params.workers,
                    size: params.size,
                    source,
                });
            }
        }
    }

    Ok(transferred)
}
