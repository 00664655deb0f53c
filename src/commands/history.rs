//! Handlers for browsing and managing the conversion history.

use crate::core::AppState;
use crate::history::{parse_id, HistoryFilters, HistoryRecord, HistoryStore};
use crate::notify::Notice;
use crate::utils::{HistoryError, PixelshiftError, PixelshiftResult};

pub async fn list_history(state: &AppState, filters: &HistoryFilters) -> Vec<HistoryRecord> {
    state.history().lock().await.get_by_filters(filters)
}

pub async fn show_history(state: &AppState, raw_id: &str) -> PixelshiftResult<HistoryRecord> {
    let id = parse_id(raw_id)?;
    let record = state
        .history()
        .lock()
        .await
        .get(id)?
        .ok_or(HistoryError::NotFound(id))?;
    Ok(record)
}

pub async fn delete_history(state: &AppState, raw_id: &str) -> PixelshiftResult<()> {
    let result = match parse_id(raw_id) {
        Ok(id) => with_store(state, move |store| store.delete(id)).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(_) => {
            state.notifier().notify(Notice::history_deleted());
            Ok(())
        }
        Err(e) => {
            state.notifier().notify(Notice::history_failed("delete history item"));
            Err(e)
        }
    }
}

/// Empties the history; returns how many records were dropped.
pub async fn clear_history(state: &AppState) -> PixelshiftResult<usize> {
    let result = with_store(state, |store| {
        let count = store.len();
        store.clear().map(|_| count)
    })
    .await;

    match result {
        Ok(count) => {
            state.notifier().notify(Notice::history_cleared());
            Ok(count)
        }
        Err(e) => {
            state.notifier().notify(Notice::history_failed("clear history"));
            Err(e)
        }
    }
}

/// Runs a mutating store call on the blocking pool, since every mutation rewrites the backing file.
async fn with_store<T, F>(state: &AppState, f: F) -> PixelshiftResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut HistoryStore) -> Result<T, HistoryError> + Send + 'static,
{
    let history = state.history();
    tokio::task::spawn_blocking(move || f(&mut history.blocking_lock()))
        .await
        .map_err(|e| PixelshiftError::Io(format!("History task failed: {e}")))?
        .map_err(Into::into)
}
