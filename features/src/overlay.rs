//! Replacing a detected marker's area in a frame with an image.
//!
//! Placement is axis-aligned: the overlay is stretched into the rectangle
//! spanned by the marker's top-left, top-right and bottom-left corners,
//! without perspective correction. Only the first detection in a frame is
//! considered.

use crate::{ArucoDetection, ArucoDetector, FeatureError, MarkerDetector, MarkerId, Result};
use cv_core::{
    corners_to_pixels, Color, Frame, MarkerCorners, PixelPoint, PixelRect, BOTTOM_LEFT, GREEN,
    RED, TOP_LEFT, TOP_RIGHT,
};
use cv_imgproc::{
    blit_rgb, draw_closed_polyline, draw_filled_circle, draw_text, resize_rgb_window,
    Interpolation, ResizeWindow,
};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Debug decorations drawn around a placed overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub decorate: bool,
    pub corner_radius: i32,
    pub corner_color: Color,
    pub outline_color: Color,
    pub outline_thickness: u32,
    pub label_color: Color,
    pub label_scale: u32,
    /// Label baseline sits this many pixels above the top-left corner.
    pub label_offset: i32,
    pub interpolation: Interpolation,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            decorate: true,
            corner_radius: 5,
            corner_color: RED,
            outline_color: GREEN,
            outline_thickness: 2,
            label_color: GREEN,
            label_scale: 2,
            label_offset: 10,
            interpolation: Interpolation::Linear,
        }
    }
}

impl OverlayStyle {
    /// Overlay only, no corner dots, outline or label.
    pub fn plain() -> Self {
        Self {
            decorate: false,
            ..Self::default()
        }
    }
}

/// The marker to react to and the image that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRequest {
    pub expected_id: MarkerId,
    pub overlay_path: PathBuf,
}

impl OverlayRequest {
    pub fn new(expected_id: MarkerId, overlay_path: impl Into<PathBuf>) -> Self {
        Self {
            expected_id,
            overlay_path: overlay_path.into(),
        }
    }
}

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Nothing was detected; the frame is untouched.
    NoMarker,
    /// The first detection carried another id; the frame is untouched.
    IdMismatch { found: MarkerId },
    /// The overlay was written into `rect`.
    Applied { id: MarkerId, rect: PixelRect },
}

impl Placement {
    pub fn is_applied(&self) -> bool {
        matches!(self, Placement::Applied { .. })
    }
}

/// Axis-aligned destination for a marker: left/top from the top-left corner,
/// right from the top-right corner, bottom from the bottom-left corner.
pub fn destination_rect(corners: &MarkerCorners) -> Result<PixelRect> {
    let px = corners_to_pixels(corners);
    let rect = PixelRect::new(
        px[TOP_LEFT].x,
        px[TOP_LEFT].y,
        px[TOP_RIGHT].x,
        px[BOTTOM_LEFT].y,
    );
    if rect.is_degenerate() {
        return Err(FeatureError::DegenerateGeometry { rect });
    }
    Ok(rect)
}

pub fn load_overlay_image(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| FeatureError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, Clone, Default)]
pub struct OverlayPlacer<D = ArucoDetector> {
    detector: D,
    style: OverlayStyle,
}

impl<D: MarkerDetector> OverlayPlacer<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            style: OverlayStyle::default(),
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Detects markers in `frame` and, if the first one is `expected_id`,
    /// replaces its rectangle with the image at `overlay_path`.
    ///
    /// On any error the frame is left exactly as it was.
    pub fn place_overlay(
        &self,
        frame: &mut Frame,
        expected_id: MarkerId,
        overlay_path: &Path,
    ) -> Result<Placement> {
        let detections = self.detector.detect(frame)?;
        let target = match select_target(&detections, expected_id) {
            Ok(det) => det,
            Err(skipped) => return Ok(skipped),
        };
        let rect = destination_rect(&target.corners)?;
        let overlay = load_overlay_image(overlay_path)?;
        self.apply(frame, target, rect, &overlay)
    }

    pub fn place_request(
        &self,
        frame: &mut Frame,
        request: &OverlayRequest,
    ) -> Result<Placement> {
        self.place_overlay(frame, request.expected_id, &request.overlay_path)
    }

    /// Same as [`place_overlay`](Self::place_overlay) with an already decoded overlay.
    pub fn place_overlay_image(
        &self,
        frame: &mut Frame,
        expected_id: MarkerId,
        overlay: &RgbImage,
    ) -> Result<Placement> {
        let detections = self.detector.detect(frame)?;
        let target = match select_target(&detections, expected_id) {
            Ok(det) => det,
            Err(skipped) => return Ok(skipped),
        };
        let rect = destination_rect(&target.corners)?;
        self.apply(frame, target, rect, overlay)
    }

    fn apply(
        &self,
        frame: &mut Frame,
        target: &ArucoDetection,
        rect: PixelRect,
        overlay: &RgbImage,
    ) -> Result<Placement> {
        // Only the part of the stretched overlay that lands on the frame is computed.
        let visible = match rect.clip_to(frame.width(), frame.height()) {
            Some(visible) => {
                let window = ResizeWindow {
                    x: (i64::from(visible.left) - i64::from(rect.left)) as u32,
                    y: (i64::from(visible.top) - i64::from(rect.top)) as u32,
                    width: visible.width() as u32,
                    height: visible.height() as u32,
                };
                let full_width = (i64::from(rect.right) - i64::from(rect.left)) as u32;
                let full_height = (i64::from(rect.bottom) - i64::from(rect.top)) as u32;
                let patch = resize_rgb_window(
                    overlay,
                    full_width,
                    full_height,
                    window,
                    self.style.interpolation,
                )?;
                Some((visible, patch))
            }
            None => None,
        };

        // Everything fallible is done; mutate from here on.
        let corners = corners_to_pixels(&target.corners);
        if self.style.decorate {
            for &p in &corners {
                draw_filled_circle(frame, p, self.style.corner_radius, self.style.corner_color);
            }
        }

        if let Some((visible, patch)) = &visible {
            blit_rgb(frame, patch, visible.left, visible.top);
        }

        if self.style.decorate {
            draw_closed_polyline(
                frame,
                &corners,
                self.style.outline_color,
                self.style.outline_thickness,
            );
            let tl = corners[TOP_LEFT];
            draw_text(
                frame,
                &target.id.to_string(),
                PixelPoint::new(tl.x, tl.y.saturating_sub(self.style.label_offset)),
                self.style.label_scale,
                self.style.label_color,
            );
        }

        let id = target.marker_id();
        tracing::debug!(%id, ?rect, "overlay applied");
        Ok(Placement::Applied { id, rect })
    }
}

// The first detection decides; later detections are ignored.
fn select_target(
    detections: &[ArucoDetection],
    expected_id: MarkerId,
) -> std::result::Result<&ArucoDetection, Placement> {
    let Some(first) = detections.first() else {
        return Err(Placement::NoMarker);
    };
    if first.marker_id() != expected_id {
        tracing::debug!(found = first.id, expected = %expected_id, "first marker does not match");
        return Err(Placement::IdMismatch {
            found: first.marker_id(),
        });
    }
    Ok(first)
}
