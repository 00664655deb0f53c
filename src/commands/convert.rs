//! Handler for the batch convert command.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{AppState, BatchProgress, ItemView, ProgressType};
use crate::history::parse_id;
use crate::notify::{Notice, NoticeLevel};
use crate::processing::{ConvertOutcome, DownloadAllOutcome};
use crate::utils::{
    HistoryError, OutputFormat, PixelshiftResult, read_source_file, validate_source,
};

/// What the user asked the convert command to do.
#[derive(Debug, Clone, Default)]
pub struct ConvertRequest {
    pub paths: Vec<PathBuf>,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    /// Reuse the format and quality of this history record (raw user text)
    pub reuse: Option<String>,
}

/// A file that never made it into the queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejected {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub outcome: ConvertOutcome,
    pub downloads: DownloadAllOutcome,
    pub rejected: Vec<Rejected>,
    pub items: Vec<ItemView>,
}

/// Reads, validates, converts and saves every requested file.
///
/// Unreadable or unsupported files are reported and skipped; they never stop
/// the rest of the batch.
pub async fn convert_images(state: &AppState, request: ConvertRequest) -> PixelshiftResult<ConvertReport> {
    let queue = state.create_queue()?;

    if let Some(raw) = request.reuse.as_deref() {
        let id = parse_id(raw)?;
        let record = state
            .history()
            .lock()
            .await
            .get(id)?
            .ok_or(HistoryError::NotFound(id))?;
        queue.apply_history_settings(&record).await?;
    }
    if let Some(format) = request.format {
        queue.set_output_format(format).await;
    }
    if let Some(quality) = request.quality {
        queue.set_quality(quality).await?;
    }

    let mut files = Vec::with_capacity(request.paths.len());
    let mut rejected = Vec::new();
    for path in request.paths {
        let checked = match read_source_file(&path).await {
            Ok(file) => validate_source(&file, state.config().max_file_size).map(|_| file),
            Err(e) => Err(e),
        };
        match checked {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                state
                    .notifier()
                    .notify(Notice::new(NoticeLevel::Warning, format!("Skipped {}: {}", path.display(), e)));
                rejected.push(Rejected {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    queue.add_images(files).await;

    let outcome = state
        .pay_and_convert_with_progress(&queue, log_progress)
        .await?;

    let downloads = match outcome {
        ConvertOutcome::NothingToConvert => DownloadAllOutcome::NothingToDownload,
        ConvertOutcome::Converted { .. } => queue.download_all().await,
    };

    let items = queue.snapshot().await;
    queue.clear_all().await;

    Ok(ConvertReport {
        outcome,
        downloads,
        rejected,
        items,
    })
}

fn log_progress(progress: BatchProgress) {
    match progress.progress_type {
        ProgressType::Start => debug!("Starting batch of {}", progress.total_tasks),
        ProgressType::Progress | ProgressType::Error => debug!(
            "[{}/{}] {}% {}",
            progress.completed_tasks,
            progress.total_tasks,
            progress.progress_percentage,
            progress.item_name.as_deref().unwrap_or("")
        ),
        ProgressType::Complete => debug!("Batch complete"),
    }
}
