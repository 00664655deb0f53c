pub mod error;
pub mod formats;
pub mod fs;
pub mod validation;

pub use error::{ConvertError, HistoryError, PixelshiftError, PixelshiftResult};
pub use formats::{
    OutputFormat,
    SUPPORTED_SOURCE_TYPES,
    format_file_size,
    media_type_from_extension,
    source_format_tag,
};
pub use fs::{extract_filename, read_source_file};
pub use validation::{validate_input_path, validate_source};
