//! Transient user-facing messages.
//!
//! Each outcome the presentation layer cares about has its own constructor so
//! every failure class reads differently to the user.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::utils::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn images_added(count: usize) -> Self {
        Self::new(NoticeLevel::Success, format!("Added {count} image{} for conversion", plural(count)))
    }

    pub fn converted(count: usize) -> Self {
        Self::new(NoticeLevel::Success, format!("Successfully converted {count} image{}", plural(count)))
    }

    pub fn conversion_failed(count: usize) -> Self {
        Self::new(NoticeLevel::Error, format!("Failed to convert {count} image{}", plural(count)))
    }

    pub fn nothing_to_convert() -> Self {
        Self::new(NoticeLevel::Info, "All images are already converted with current settings")
    }

    pub fn downloaded() -> Self {
        Self::new(NoticeLevel::Success, "Image downloaded successfully!")
    }

    pub fn downloaded_all(count: usize) -> Self {
        Self::new(NoticeLevel::Success, format!("Downloaded {count} image{}", plural(count)))
    }

    pub fn download_failed(name: &str) -> Self {
        Self::new(NoticeLevel::Error, format!("Failed to download {name}"))
    }

    pub fn nothing_to_download() -> Self {
        Self::new(NoticeLevel::Warning, "No converted images to download")
    }

    pub fn image_removed() -> Self {
        Self::new(NoticeLevel::Info, "Image removed")
    }

    pub fn all_cleared() -> Self {
        Self::new(NoticeLevel::Info, "All images cleared")
    }

    pub fn settings_applied(format: OutputFormat, quality: u8) -> Self {
        Self::new(
            NoticeLevel::Success,
            format!("Applied settings: {} at {}% quality", format.tag().to_uppercase(), quality),
        )
    }

    pub fn history_deleted() -> Self {
        Self::new(NoticeLevel::Success, "History item deleted")
    }

    pub fn history_cleared() -> Self {
        Self::new(NoticeLevel::Success, "Conversion history cleared")
    }

    pub fn history_failed(action: &str) -> Self {
        Self::new(NoticeLevel::Error, format!("Failed to {action}"))
    }

    pub fn payment_processing(price: &str, count: usize) -> Self {
        Self::new(
            NoticeLevel::Info,
            format!("Processing payment of ${price} for {count} image{}...", plural(count)),
        )
    }

    pub fn payment_succeeded() -> Self {
        Self::new(NoticeLevel::Success, "Payment successful! Converting images now...")
    }

    pub fn payment_failed() -> Self {
        Self::new(NoticeLevel::Error, "Payment processing failed. Please try again.")
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => info!("{}", notice),
            NoticeLevel::Warning => warn!("{}", notice),
            NoticeLevel::Error => error!("{}", notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_counts() {
        assert_eq!(Notice::images_added(1).message, "Added 1 image for conversion");
        assert_eq!(Notice::converted(3).message, "Successfully converted 3 images");
        assert_eq!(Notice::conversion_failed(2).level, NoticeLevel::Error);
    }

    #[test]
    fn failure_classes_are_distinct() {
        let failures = [
            Notice::conversion_failed(1),
            Notice::download_failed("a.png"),
            Notice::history_failed("delete history item"),
            Notice::payment_failed(),
        ];
        for (i, a) in failures.iter().enumerate() {
            for b in &failures[i + 1..] {
                assert_ne!(a.message, b.message);
            }
        }
    }

    #[test]
    fn settings_notice_uppercases_format() {
        assert_eq!(
            Notice::settings_applied(OutputFormat::Webp, 70).message,
            "Applied settings: WEBP at 70% quality"
        );
    }
}
