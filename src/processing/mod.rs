//! Image conversion: the format converter and the queue driving it.

mod converter;
mod encode;
mod queue;

pub use converter::{convert_blocking, probe_dimensions, rasterize, EncodedImage, FormatConverter, RasterConverter};
pub use encode::encode_surface;
pub use queue::{ConversionQueue, ConvertOutcome, DownloadAllOutcome, DownloadOutcome};
