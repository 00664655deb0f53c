use std::path::Path;
use tokio::fs;
use crate::core::SourceFile;
use crate::utils::{PixelshiftError, PixelshiftResult, media_type_from_extension, validate_input_path};

/// Reads a file from disk into a [`SourceFile`], deriving its media type from the extension
pub async fn read_source_file(path: impl AsRef<Path>) -> PixelshiftResult<SourceFile> {
    let path = path.as_ref();
    validate_input_path(path)?;

    let bytes = fs::read(path)
        .await
        .map_err(|e| PixelshiftError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    let name = extract_filename(path);
    let media_type = media_type_from_extension(&name);
    Ok(SourceFile::new(name, media_type, bytes))
}

/// File name component of `path`, lossily converted
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
