//! Command handlers for the `pixelshift` binary.
//!
//! - [`convert_images`]: Validate, convert and save a batch of files
//! - [`list_history`] / [`show_history`] / [`delete_history`] / [`clear_history`]: History management

mod convert;
mod history;

pub use convert::{convert_images, ConvertReport, ConvertRequest, Rejected};
pub use history::{clear_history, delete_history, list_history, show_history};
