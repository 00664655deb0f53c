//! The conversion queue: owns the uploaded images, the output settings and
//! every status change.
//!
//! Conversions run strictly one at a time. The item lock is released while a
//! conversion is suspended, so settings changes and add/remove calls can land
//! between the start and the end of a conversion, but never inside either
//! critical section.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::{
    BatchProgress, ConversionSettings, ImageItem, ItemId, ItemView, ProgressType, SourceFile, StatusTag,
};
use crate::history::{HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::host::{DownloadHandle, MediaHost};
use crate::notify::{Notice, Notifier};
use crate::processing::{EncodedImage, FormatConverter};
use crate::utils::{OutputFormat, PixelshiftError, PixelshiftResult};

/// Result of a convert-all request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// No item was eligible; the converter was never called
    NothingToConvert,
    Converted { succeeded: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    /// Unknown id or no converted output yet
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadAllOutcome {
    NothingToDownload,
    Downloaded { saved: Vec<PathBuf>, failed: usize },
}

struct QueueState {
    items: Vec<ImageItem>,
    settings: ConversionSettings,
}

impl QueueState {
    fn find_mut(&mut self, id: ItemId) -> Option<&mut ImageItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }
}

/// Everything captured when an item enters `converting`.
struct Job {
    id: ItemId,
    name: String,
    source: Arc<[u8]>,
    media_type: String,
    source_size: u64,
    settings: ConversionSettings,
}

/// Cheap-to-clone handle on the shared queue.
#[derive(Clone)]
pub struct ConversionQueue {
    state: Arc<Mutex<QueueState>>,
    converter: Arc<dyn FormatConverter>,
    history: Arc<Mutex<HistoryStore>>,
    host: Arc<dyn MediaHost>,
    notifier: Arc<dyn Notifier>,
}

impl ConversionQueue {
    pub fn new(
        settings: ConversionSettings,
        converter: Arc<dyn FormatConverter>,
        history: Arc<Mutex<HistoryStore>>,
        host: Arc<dyn MediaHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: Vec::new(),
                settings,
            })),
            converter,
            history,
            host,
            notifier,
        }
    }

    pub async fn settings(&self) -> ConversionSettings {
        self.state.lock().await.settings
    }

    /// Appends one pending item per file, in order.
    pub async fn add_images(&self, files: Vec<SourceFile>) -> Vec<ItemId> {
        if files.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.lock().await;
        let settings = state.settings;
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            let preview = self.host.create_preview(&file.name, &file.bytes);
            let item = ImageItem::new(file, preview, settings);
            debug!("Queued '{}' as {} ({} bytes)", item.name(), item.id(), item.source_size());
            ids.push(item.id());
            state.items.push(item);
        }
        drop(state);

        self.notifier.notify(Notice::images_added(ids.len()));
        ids
    }

    /// Replaces the output settings and relabels every item not converting.
    ///
    /// Returns how many converted items were demoted to pending.
    pub async fn apply_settings(&self, settings: ConversionSettings) -> usize {
        let mut state = self.state.lock().await;
        state.settings = settings;

        let demoted = state
            .items
            .iter_mut()
            .map(|item| item.retarget(settings))
            .filter(|demoted| *demoted)
            .count();

        debug!(
            "Settings now {} @ {} ({} item(s) re-queued)",
            settings.output_format(), settings.quality(), demoted
        );
        demoted
    }

    pub async fn set_output_format(&self, format: OutputFormat) -> usize {
        let current = self.settings().await;
        self.apply_settings(current.with_format(format)).await
    }

    pub async fn set_quality(&self, quality: u8) -> PixelshiftResult<usize> {
        let current = self.settings().await;
        let settings = ConversionSettings::new(current.output_format(), quality)?;
        Ok(self.apply_settings(settings).await)
    }

    /// Reuses the format and quality of a past conversion.
    pub async fn apply_history_settings(&self, record: &HistoryRecord) -> PixelshiftResult<usize> {
        let settings = ConversionSettings::new(record.output_format, record.quality)?;
        let demoted = self.apply_settings(settings).await;
        self.notifier
            .notify(Notice::settings_applied(settings.output_format(), settings.quality()));
        Ok(demoted)
    }

    pub async fn convert_all(&self) -> ConvertOutcome {
        self.convert_all_with_progress(|_| {}).await
    }

    /// Converts every eligible item in insertion order, one at a time.
    ///
    /// Per-item failures mark that item `error` and the batch moves on.
    /// `progress` is called once before the first item and after each item.
    pub async fn convert_all_with_progress(
        &self,
        mut progress: impl FnMut(BatchProgress) + Send,
    ) -> ConvertOutcome {
        let eligible: Vec<ItemId> = {
            let state = self.state.lock().await;
            let settings = state.settings;
            state
                .items
                .iter()
                .filter(|item| item.is_eligible(&settings))
                .map(ImageItem::id)
                .collect()
        };

        if eligible.is_empty() {
            info!("Nothing to convert");
            self.notifier.notify(Notice::nothing_to_convert());
            return ConvertOutcome::NothingToConvert;
        }

        let total = eligible.len();
        info!("Converting {} image(s)", total);
        progress(BatchProgress::new(ProgressType::Start, 0, total));

        let mut succeeded = 0;
        let mut failed = 0;

        for (index, id) in eligible.into_iter().enumerate() {
            let Some(job) = self.begin(id).await else {
                progress(BatchProgress::new(ProgressType::Progress, index + 1, total));
                continue;
            };

            let result = self
                .converter
                .convert(
                    job.source.clone(),
                    &job.media_type,
                    job.settings.output_format(),
                    job.settings.quality(),
                )
                .await;

            let update = match result {
                Ok(encoded) => {
                    let converted_size = encoded.size();
                    if self.finish_ok(&job, encoded).await {
                        succeeded += 1;
                        self.record_history(&job, converted_size).await;
                    }
                    BatchProgress::new(ProgressType::Progress, index + 1, total).with_item(&job.name)
                }
                Err(e) => {
                    warn!("Conversion failed for '{}': {}", job.name, e);
                    if self.finish_err(&job, e.to_string()).await {
                        failed += 1;
                    }
                    BatchProgress::new(ProgressType::Error, index + 1, total)
                        .with_item(&job.name)
                        .with_error(e.to_string())
                }
            };
            progress(update);
        }

        progress(BatchProgress::new(ProgressType::Complete, total, total));
        info!("Batch done: {} converted, {} failed", succeeded, failed);

        if succeeded > 0 {
            self.notifier.notify(Notice::converted(succeeded));
        }
        if failed > 0 {
            self.notifier.notify(Notice::conversion_failed(failed));
        }

        ConvertOutcome::Converted { succeeded, failed }
    }

    /// Marks `id` converting with the current settings, if it still needs it.
    async fn begin(&self, id: ItemId) -> Option<Job> {
        let mut state = self.state.lock().await;
        let settings = state.settings;
        let item = state.find_mut(id)?;

        if !item.is_eligible(&settings) {
            debug!("'{}' no longer needs conversion, skipping", item.name());
            return None;
        }

        match item.begin(settings) {
            Ok(settings) => Some(Job {
                id,
                name: item.name().to_string(),
                source: item.source().clone(),
                media_type: item.source_media_type().to_string(),
                source_size: item.source_size(),
                settings,
            }),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Stores a finished output. Returns false when the item vanished meanwhile.
    async fn finish_ok(&self, job: &Job, encoded: EncodedImage) -> bool {
        let mut state = self.state.lock().await;
        let current = state.settings;
        let Some(item) = state.find_mut(job.id) else {
            debug!("'{}' was removed while converting, discarding output", job.name);
            return false;
        };

        if let Err(e) = item.complete(encoded, job.settings) {
            warn!("{}", e);
            return false;
        }

        if !current.matches(job.settings.output_format(), job.settings.quality()) {
            debug!(
                "'{}' finished with outdated settings ({} @ {}), it stays eligible",
                job.name, job.settings.output_format(), job.settings.quality()
            );
        }
        true
    }

    async fn finish_err(&self, job: &Job, reason: String) -> bool {
        let mut state = self.state.lock().await;
        match state.find_mut(job.id) {
            Some(item) => match item.fail(reason) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// History failures are logged and never affect the conversion.
    async fn record_history(&self, job: &Job, converted_size: u64) {
        let record = NewHistoryRecord {
            original_name: job.name.clone(),
            original_size: job.source_size,
            output_format: job.settings.output_format(),
            quality: job.settings.quality(),
            converted_size,
        };

        let history = self.history.clone();
        let saved = tokio::task::spawn_blocking(move || history.blocking_lock().create(record)).await;
        match saved {
            Ok(Ok(record)) => debug!("Recorded conversion as history entry {}", record.id),
            Ok(Err(e)) => error!("Failed to save conversion history: {}", e),
            Err(e) => error!("History task failed: {}", e),
        }
    }

    /// Releases the item's preview and drops it. Unknown ids are ignored.
    pub async fn remove(&self, id: ItemId) -> bool {
        let mut state = self.state.lock().await;
        let Some(index) = state.items.iter().position(|item| item.id() == id) else {
            debug!("Remove ignored: no item {}", id);
            return false;
        };

        self.host.revoke_preview(state.items[index].preview());
        let item = state.items.remove(index);
        drop(state);

        debug!("Removed '{}'", item.name());
        self.notifier.notify(Notice::image_removed());
        true
    }

    /// Releases every preview and empties the queue. Returns how many items were dropped.
    pub async fn clear_all(&self) -> usize {
        let mut state = self.state.lock().await;
        for item in &state.items {
            self.host.revoke_preview(item.preview());
        }
        let count = state.items.len();
        state.items.clear();
        drop(state);

        self.notifier.notify(Notice::all_cleared());
        count
    }

    /// Saves one converted item through the host.
    pub async fn download_one(&self, id: ItemId) -> PixelshiftResult<DownloadOutcome> {
        let outcome = self.save_item(id).await?;
        if matches!(outcome, DownloadOutcome::Saved(_)) {
            self.notifier.notify(Notice::downloaded());
        }
        Ok(outcome)
    }

    /// Saves every converted item; individual save failures are counted, not fatal.
    pub async fn download_all(&self) -> DownloadAllOutcome {
        let converted: Vec<(ItemId, String)> = {
            let state = self.state.lock().await;
            state
                .items
                .iter()
                .filter(|item| item.result().is_some())
                .map(|item| (item.id(), item.name().to_string()))
                .collect()
        };

        if converted.is_empty() {
            self.notifier.notify(Notice::nothing_to_download());
            return DownloadAllOutcome::NothingToDownload;
        }

        let mut saved = Vec::with_capacity(converted.len());
        let mut failed = 0;
        for (id, name) in converted {
            match self.save_item(id).await {
                Ok(DownloadOutcome::Saved(path)) => saved.push(path),
                Ok(DownloadOutcome::NotReady) => {}
                Err(e) => {
                    error!("Download of '{}' failed: {}", name, e);
                    self.notifier.notify(Notice::download_failed(&name));
                    failed += 1;
                }
            }
        }

        self.notifier.notify(Notice::downloaded_all(saved.len()));
        DownloadAllOutcome::Downloaded { saved, failed }
    }

    async fn save_item(&self, id: ItemId) -> PixelshiftResult<DownloadOutcome> {
        let (file_name, media_type, bytes) = {
            let state = self.state.lock().await;
            let Some(item) = state.items.iter().find(|item| item.id() == id) else {
                return Ok(DownloadOutcome::NotReady);
            };
            let Some(output) = item.result() else {
                debug!("'{}' has no converted output yet", item.name());
                return Ok(DownloadOutcome::NotReady);
            };
            (item.download_name(), output.format.media_type(), output.bytes.clone())
        };

        let host = self.host.clone();
        let path = tokio::task::spawn_blocking(move || {
            host.save(&DownloadHandle {
                file_name,
                media_type,
                bytes: &bytes[..],
            })
        })
        .await
        .map_err(|e| PixelshiftError::Io(format!("Save task failed: {e}")))??;

        Ok(DownloadOutcome::Saved(path))
    }

    /// Render snapshot, in insertion order.
    pub async fn snapshot(&self) -> Vec<ItemView> {
        self.state.lock().await.items.iter().map(ImageItem::view).collect()
    }

    pub async fn view(&self, id: ItemId) -> Option<ItemView> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| item.id() == id).map(ImageItem::view)
    }

    pub async fn status(&self, id: ItemId) -> Option<StatusTag> {
        self.view(id).await.map(|view| view.status)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn converted_count(&self) -> usize {
        let state = self.state.lock().await;
        state.items.iter().filter(|item| item.result().is_some()).count()
    }
}
