use crate::storage::{StorageError, StorageResult, UrlRecord, UrlStore};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upserts every record with at most `concurrency` writes in flight
///
/// All writes are awaited even when one fails; the first error is then
/// returned.
///
/// # Returns
///
/// * `Ok(usize)` - Number of records written
/// * `Err(StorageError)` - The first failed write
pub async fn persist_urls(
    store: Arc<dyn UrlStore>,
    records: Vec<UrlRecord>,
    concurrency: usize,
) -> StorageResult<usize> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut writes = JoinSet::new();

    for record in records {
        let store = Arc::clone(&store);
        let semaphore = Arc::clone(&semaphore);
        writes.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| StorageError::Database(format!("write limiter closed: {}", e)))?;
            store.upsert_url(&record).await
        });
    }

    let mut written = 0;
    let mut first_error = None;

    while let Some(joined) = writes.join_next().await {
        let outcome = joined
            .map_err(|e| StorageError::Database(format!("write task failed: {}", e)))
            .and_then(|result| result);

        match outcome {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::warn!("URL write failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
