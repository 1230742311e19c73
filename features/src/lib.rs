pub mod generate;
pub mod id_encoding;
pub mod markers;
pub mod overlay;

pub use generate::*;
pub use id_encoding::*;
pub use markers::*;
pub use overlay::*;

use cv_core::PixelRect;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Failed to load overlay image {}: {source}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Degenerate geometry: destination rectangle {rect:?} has no area")]
    DegenerateGeometry { rect: PixelRect },

    #[error("Failed to write image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid marker id {id}: dictionary holds {dictionary_size} markers")]
    InvalidMarkerId { id: u32, dictionary_size: usize },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Detection error: {0}")]
    DetectionError(String),

    #[error("Image processing error: {0}")]
    Imgproc(#[from] cv_imgproc::ImgprocError),
}
