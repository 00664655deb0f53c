//! Queued images and their conversion state machine.
//!
//! `pending -> converting -> converted | error`. Converted and errored items
//! go back to `pending` only through [`ImageItem::retarget`] when the output
//! settings move away from what they were converted with.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::core::types::{ConversionSettings, ItemView, StatusTag};
use crate::host::PreviewHandle;
use crate::processing::EncodedImage;
use crate::utils::{OutputFormat, source_format_tag};

/// Opaque identifier assigned when an image is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An uploaded file: name, declared media type and content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Encoded output of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedImage {
    pub bytes: Arc<[u8]>,
    pub format: OutputFormat,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
}

impl ConvertedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Per-item conversion status. The output only exists in `Converted`.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    Pending,
    Converting,
    Converted(ConvertedImage),
    Error(String),
}

impl ItemStatus {
    pub fn tag(&self) -> StatusTag {
        match self {
            Self::Pending => StatusTag::Pending,
            Self::Converting => StatusTag::Converting,
            Self::Converted(_) => StatusTag::Converted,
            Self::Error(_) => StatusTag::Error,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("illegal transition for item {item}: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub item: ItemId,
    pub from: StatusTag,
    pub to: StatusTag,
}

/// One uploaded image and its conversion state.
#[derive(Debug)]
pub struct ImageItem {
    id: ItemId,
    name: String,
    source: Arc<[u8]>,
    source_media_type: String,
    source_format: String,
    preview: PreviewHandle,
    result_format: OutputFormat,
    quality: u8,
    status: ItemStatus,
}

impl ImageItem {
    /// Creates a pending item targeting `settings`.
    pub fn new(file: SourceFile, preview: PreviewHandle, settings: ConversionSettings) -> Self {
        Self {
            id: ItemId::new(),
            source_format: source_format_tag(&file.media_type),
            name: file.name,
            source: file.bytes,
            source_media_type: file.media_type,
            preview,
            result_format: settings.output_format(),
            quality: settings.quality(),
            status: ItemStatus::Pending,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<[u8]> {
        &self.source
    }

    pub fn source_media_type(&self) -> &str {
        &self.source_media_type
    }

    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    pub fn source_size(&self) -> u64 {
        self.source.len() as u64
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn result_format(&self) -> OutputFormat {
        self.result_format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    pub fn result(&self) -> Option<&ConvertedImage> {
        match &self.status {
            ItemStatus::Converted(out) => Some(out),
            _ => None,
        }
    }

    pub fn result_size(&self) -> Option<u64> {
        self.result().map(ConvertedImage::size)
    }

    pub fn is_converting(&self) -> bool {
        matches!(self.status, ItemStatus::Converting)
    }

    /// Whether the next convert-all should (re)convert this item.
    pub fn is_eligible(&self, settings: &ConversionSettings) -> bool {
        match &self.status {
            ItemStatus::Converting => false,
            ItemStatus::Pending | ItemStatus::Error(_) => true,
            ItemStatus::Converted(_) => !settings.matches(self.result_format, self.quality),
        }
    }

    /// Download file name: the original name up to its first dot, plus the result tag.
    pub fn download_name(&self) -> String {
        let base = self.name.split('.').next().unwrap_or_default();
        let base = if base.is_empty() { "image" } else { base };
        format!("{}.{}", base, self.result_format.tag())
    }

    /// Moves the item into `converting` and returns the settings it converts with.
    pub fn begin(&mut self, settings: ConversionSettings) -> Result<ConversionSettings, TransitionError> {
        if self.is_converting() {
            return Err(self.illegal(StatusTag::Converting));
        }
        self.result_format = settings.output_format();
        self.quality = settings.quality();
        self.status = ItemStatus::Converting;
        Ok(settings)
    }

    /// Stores a finished conversion made with `settings`.
    pub fn complete(&mut self, output: EncodedImage, settings: ConversionSettings) -> Result<(), TransitionError> {
        if !self.is_converting() {
            return Err(self.illegal(StatusTag::Converted));
        }
        self.result_format = settings.output_format();
        self.quality = settings.quality();
        self.status = ItemStatus::Converted(ConvertedImage {
            bytes: Arc::from(output.bytes),
            format: output.format,
            quality: settings.quality(),
            width: output.width,
            height: output.height,
        });
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if !self.is_converting() {
            return Err(self.illegal(StatusTag::Error));
        }
        self.status = ItemStatus::Error(reason.into());
        Ok(())
    }

    /// Relabels the item with new target settings.
    ///
    /// A converted item whose output no longer matches is demoted to `pending`
    /// and drops its output. Converting items are left untouched. Returns true
    /// when the item was demoted.
    pub fn retarget(&mut self, settings: ConversionSettings) -> bool {
        if self.is_converting() {
            return false;
        }

        let demote = match &self.status {
            ItemStatus::Converted(out) => !settings.matches(out.format, out.quality),
            _ => false,
        };

        self.result_format = settings.output_format();
        self.quality = settings.quality();
        if demote {
            self.status = ItemStatus::Pending;
        }
        demote
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id.to_string(),
            name: self.name.clone(),
            source_format: self.source_format.clone(),
            source_size: self.source_size(),
            preview: self.preview.to_string(),
            result_format: self.result_format,
            result_size: self.result_size(),
            quality: self.quality,
            status: self.status.tag(),
            error: match &self.status {
                ItemStatus::Error(reason) => Some(reason.clone()),
                _ => None,
            },
        }
    }

    fn illegal(&self, to: StatusTag) -> TransitionError {
        TransitionError {
            item: self.id,
            from: self.status.tag(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(settings: ConversionSettings) -> ImageItem {
        ImageItem::new(
            SourceFile::new("holiday.final.png", "image/png", vec![0u8; 16]),
            PreviewHandle::new("preview://test"),
            settings,
        )
    }

    fn encoded(format: OutputFormat) -> EncodedImage {
        EncodedImage {
            bytes: vec![9u8; 4],
            format,
            width: 2,
            height: 2,
        }
    }

    fn settings(format: OutputFormat, quality: u8) -> ConversionSettings {
        ConversionSettings::new(format, quality).unwrap()
    }

    #[test]
    fn new_item_is_pending_with_source_metadata() {
        let item = item(ConversionSettings::default());
        assert_eq!(item.status().tag(), StatusTag::Pending);
        assert_eq!(item.source_format(), "png");
        assert_eq!(item.source_size(), 16);
        assert!(item.result().is_none());
        assert_eq!(item.result_size(), None);
    }

    #[test]
    fn full_success_path_keeps_output_only_when_converted() {
        let target = settings(OutputFormat::Png, 85);
        let mut item = item(target);

        item.begin(target).unwrap();
        assert!(item.result().is_none());

        item.complete(encoded(OutputFormat::Png), target).unwrap();
        assert_eq!(item.status().tag(), StatusTag::Converted);
        assert_eq!(item.result_size(), Some(4));
        assert_eq!(item.result_format(), OutputFormat::Png);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let target = ConversionSettings::default();
        let mut item = item(target);

        assert!(item.complete(encoded(OutputFormat::Jpeg), target).is_err());
        assert!(item.fail("nope").is_err());

        item.begin(target).unwrap();
        let err = item.begin(target).unwrap_err();
        assert_eq!(err.from, StatusTag::Converting);
    }

    #[test]
    fn retarget_demotes_only_mismatched_converted_items() {
        let jpeg85 = settings(OutputFormat::Jpeg, 85);
        let mut item = item(jpeg85);
        item.begin(jpeg85).unwrap();
        item.complete(encoded(OutputFormat::Jpeg), jpeg85).unwrap();

        assert!(!item.retarget(jpeg85));
        assert_eq!(item.status().tag(), StatusTag::Converted);

        assert!(item.retarget(settings(OutputFormat::Jpeg, 50)));
        assert_eq!(item.status().tag(), StatusTag::Pending);
        assert!(item.result().is_none());
        assert_eq!(item.quality(), 50);
    }

    #[test]
    fn retarget_relabels_pending_and_error_without_status_change() {
        let mut item = item(ConversionSettings::default());
        let webp = settings(OutputFormat::Webp, 70);
        assert!(!item.retarget(webp));
        assert_eq!(item.status().tag(), StatusTag::Pending);
        assert_eq!(item.result_format(), OutputFormat::Webp);

        item.begin(webp).unwrap();
        item.fail("boom").unwrap();
        assert!(!item.retarget(ConversionSettings::default()));
        assert_eq!(item.status().tag(), StatusTag::Error);
        assert_eq!(item.quality(), 85);
    }

    #[test]
    fn retarget_leaves_converting_items_alone() {
        let jpeg85 = ConversionSettings::default();
        let mut item = item(jpeg85);
        item.begin(jpeg85).unwrap();

        assert!(!item.retarget(settings(OutputFormat::Png, 10)));
        assert_eq!(item.status().tag(), StatusTag::Converting);
        assert_eq!(item.result_format(), OutputFormat::Jpeg);
        assert_eq!(item.quality(), 85);
    }

    #[test]
    fn eligibility_follows_status_and_settings() {
        let jpeg85 = ConversionSettings::default();
        let mut item = item(jpeg85);
        assert!(item.is_eligible(&jpeg85));

        item.begin(jpeg85).unwrap();
        assert!(!item.is_eligible(&jpeg85));

        item.complete(encoded(OutputFormat::Jpeg), jpeg85).unwrap();
        assert!(!item.is_eligible(&jpeg85));
        assert!(item.is_eligible(&settings(OutputFormat::Png, 85)));
    }

    #[test]
    fn download_name_cuts_at_first_dot() {
        let jpeg85 = ConversionSettings::default();
        let item = item(jpeg85);
        assert_eq!(item.download_name(), "holiday.jpeg");
    }
}
