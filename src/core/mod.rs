//! Core application types and state management.
//!
//! This module contains the fundamental types used throughout the application:
//! - [`AppState`]: Process-wide context wiring the history store, converter and host
//! - [`ImageItem`]: One queued image and its conversion state machine
//! - [`ConversionSettings`]: Output format and quality chosen by the user
//! - [`BatchProgress`]: Progress tracking for convert-all batches

mod item;
mod progress;
mod state;
mod types;

pub use item::{ConvertedImage, ImageItem, ItemId, ItemStatus, SourceFile, TransitionError};
pub use progress::{BatchProgress, ProgressType};
pub use state::AppState;
pub use types::{validate_quality, ConversionSettings, ItemView, StatusTag, DEFAULT_QUALITY};
