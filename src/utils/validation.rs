use std::path::Path;
use crate::core::SourceFile;
use crate::utils::{PixelshiftError, PixelshiftResult, SUPPORTED_SOURCE_TYPES};

/// Validates an upload before it is queued: media type and size.
pub fn validate_source(file: &SourceFile, max_size: u64) -> PixelshiftResult<()> {
    let media_type = file.media_type.to_lowercase();
    if !SUPPORTED_SOURCE_TYPES.contains(&media_type.as_str()) {
        return Err(PixelshiftError::validation(
            format!("Unsupported file type: {}", file.media_type)
        ));
    }

    if file.size() > max_size {
        return Err(PixelshiftError::validation(format!(
            "File size too large. Maximum size is {}MB.",
            max_size / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Validates the input file path
pub fn validate_input_path(path: &Path) -> PixelshiftResult<()> {
    if !path.exists() {
        return Err(PixelshiftError::validation(
            format!("Input file does not exist: {}", path.display())
        ));
    }

    if !path.is_file() {
        return Err(PixelshiftError::validation(
            format!("Input path is not a file: {}", path.display())
        ));
    }

    Ok(())
}
