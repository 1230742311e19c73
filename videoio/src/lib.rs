//! Frame sources and sinks for the overlay loop.
//!
//! Frames are read from and written to directories of still images; there is
//! no camera or video-container support.

use image::RgbImage;
use std::fmt::Debug;

pub type Result<T> = std::result::Result<T, VideoError>;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("End of stream")]
    EndOfStream,
}

/// Generic interface for frame sources.
pub trait VideoCapture: Debug {
    fn is_opened(&self) -> bool;
    fn grab(&mut self) -> Result<()>;
    fn retrieve(&mut self) -> Result<RgbImage>;
    fn read(&mut self) -> Result<RgbImage> {
        self.grab()?;
        self.retrieve()
    }
}

/// Generic interface for frame sinks.
pub trait VideoWriter: Debug {
    fn write(&mut self, frame: &RgbImage) -> Result<()>;
}

pub mod backends;

/// Open a directory of frames as a capture source.
pub fn open_sequence<P: AsRef<std::path::Path>>(dir: P) -> Result<Box<dyn VideoCapture>> {
    Ok(Box::new(backends::PngSequenceCapture::new(dir)?))
}
