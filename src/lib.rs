// Module declarations in dependency order
pub mod utils;
pub mod host;
pub mod notify;
pub mod payment;
pub mod history;
pub mod processing;
pub mod core;
pub mod config;
pub mod commands;

// Public exports for external consumers
pub use crate::core::{AppState, ConversionSettings, ImageItem, ItemId, ItemStatus, ItemView, SourceFile, StatusTag};
pub use history::{HistoryFilters, HistoryRecord, HistoryStore};
pub use processing::{ConversionQueue, ConvertOutcome, FormatConverter, RasterConverter};
pub use utils::{ConvertError, HistoryError, OutputFormat, PixelshiftError, PixelshiftResult};
pub use config::Config;
