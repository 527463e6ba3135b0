//! Time-boxed snapshot writes for async hosts.
use std::time::Duration;

use crate::SeasonStorage;
use crate::storage::{OwnerId, PersistenceError, SavedSeason};

/// Save the whole snapshot `season` on a blocking task, giving up after
/// `limit`.
///
/// A timeout leaves the caller's in-memory state untouched; the write may
/// still land later, and retrying is safe because snapshots are
/// last-write-wins.
///
/// # Errors
///
/// Returns `PersistenceError` when the store fails, the task panics, or the
/// limit elapses.
pub async fn persist_with_timeout<S>(
    storage: S,
    owner: OwnerId,
    season: SavedSeason,
    limit: Duration,
) -> Result<(), PersistenceError>
where
    S: SeasonStorage + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        storage
            .save_state(&owner, &season)
            .map_err(|err| PersistenceError::new("save_state", err))
    });
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(PersistenceError::new("save_state", join_err)),
        Err(_) => {
            log::warn!("Snapshot save timed out after {}ms", limit.as_millis());
            Err(PersistenceError::new(
                "save_state",
                format!("timed out after {}ms", limit.as_millis()),
            ))
        }
    }
}
