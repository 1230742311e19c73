//! Capture and writer backends

pub mod png_sequence;

pub use png_sequence::{PngSequenceCapture, PngSequenceWriter};
