use crate::{Result, VideoCapture, VideoError, VideoWriter};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Reads the image files of a directory in lexicographic file-name order.
#[derive(Debug)]
pub struct PngSequenceCapture {
    frames: Vec<PathBuf>,
    current_idx: usize,
    grabbed: bool,
}

impl PngSequenceCapture {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        let mut frames = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(VideoError::InvalidParameters(format!(
                "no frames found in {}",
                directory.display()
            )));
        }
        frames.sort();
        tracing::debug!(count = frames.len(), dir = %directory.display(), "opened frame sequence");

        Ok(Self {
            frames,
            current_idx: 0,
            grabbed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoCapture for PngSequenceCapture {
    fn is_opened(&self) -> bool {
        self.current_idx < self.frames.len()
    }

    fn grab(&mut self) -> Result<()> {
        if self.current_idx >= self.frames.len() {
            return Err(VideoError::EndOfStream);
        }
        self.grabbed = true;
        Ok(())
    }

    fn retrieve(&mut self) -> Result<RgbImage> {
        if !self.grabbed {
            return Err(VideoError::CaptureFailed("retrieve called before grab".to_string()));
        }
        self.grabbed = false;
        let path = &self.frames[self.current_idx];
        self.current_idx += 1;
        let img = image::open(path).map_err(|e| {
            VideoError::CaptureFailed(format!("failed to decode {}: {}", path.display(), e))
        })?;
        Ok(img.to_rgb8())
    }
}

/// Writes frames as `<prefix>_<index:06>.png`.
#[derive(Debug)]
pub struct PngSequenceWriter {
    directory: PathBuf,
    prefix: String,
    frame_count: usize,
}

impl PngSequenceWriter {
    pub fn new(directory: &Path, prefix: &str) -> Result<Self> {
        if !directory.exists() {
            fs::create_dir_all(directory)?;
        }

        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            frame_count: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}_{:06}.png", self.prefix, index))
    }
}

impl VideoWriter for PngSequenceWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        let path = self.frame_path(self.frame_count);
        frame
            .save(&path)
            .map_err(|e| VideoError::Backend(format!("Failed to save frame: {}", e)))?;
        self.frame_count += 1;
        Ok(())
    }
}
