//! Frame-by-frame overlay loop.

use cv_core::Frame;
use cv_features::{ArucoDetector, MarkerDetector, OverlayPlacer, OverlayRequest, Placement};
use cv_videoio::{VideoCapture, VideoError, VideoWriter};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Reads frames, overlays the requested marker and writes every frame on.
///
/// A frame that cannot be processed is logged, counted as failed and passed
/// through unmodified; the loop keeps going.
#[derive(Debug, Clone)]
pub struct OverlaySession<D = ArucoDetector> {
    placer: OverlayPlacer<D>,
    request: OverlayRequest,
}

impl<D: MarkerDetector> OverlaySession<D> {
    pub fn new(placer: OverlayPlacer<D>, request: OverlayRequest) -> Self {
        Self { placer, request }
    }

    pub fn request(&self) -> &OverlayRequest {
        &self.request
    }

    /// Processes one frame in place and records the outcome in `stats`.
    pub fn process_frame(&self, frame: &mut Frame, stats: &mut SessionStats) {
        stats.frames += 1;
        match self.placer.place_request(frame, &self.request) {
            Ok(Placement::Applied { .. }) => stats.applied += 1,
            Ok(_) => stats.skipped += 1,
            Err(e) => {
                tracing::warn!(
                    frame = stats.frames,
                    error = %e,
                    "overlay failed, passing frame through"
                );
                stats.failed += 1;
            }
        }
    }

    /// Runs until the capture reports end of stream.
    ///
    /// Undecodable frames are skipped. Other capture errors and all writer
    /// errors end the run.
    pub fn run(
        &self,
        capture: &mut dyn VideoCapture,
        writer: &mut dyn VideoWriter,
    ) -> Result<SessionStats, SessionError> {
        let mut stats = SessionStats::default();
        loop {
            let mut frame = match capture.read() {
                Ok(frame) => frame,
                Err(VideoError::EndOfStream) => break,
                Err(VideoError::CaptureFailed(msg)) => {
                    tracing::warn!(error = %msg, "skipping unreadable frame");
                    stats.frames += 1;
                    stats.failed += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.process_frame(&mut frame, &mut stats);
            writer.write(&frame)?;
        }
        tracing::debug!(?stats, "session finished");
        Ok(stats)
    }
}
