use nalgebra::Point2;

/// The four corners of a detected marker in image pixel coordinates,
/// ordered top-left, top-right, bottom-right, bottom-left.
pub type MarkerCorners = [Point2<f32>; 4];

pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_RIGHT: usize = 2;
pub const BOTTOM_LEFT: usize = 3;

/// Integer pixel position. Conversion from sub-pixel corners truncates
/// toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn from_subpixel(p: &Point2<f32>) -> Self {
        Self {
            x: p.x as i32,
            y: p.y as i32,
        }
    }
}

/// Truncates all four marker corners to integer pixels, keeping their order.
pub fn corners_to_pixels(corners: &MarkerCorners) -> [PixelPoint; 4] {
    [
        PixelPoint::from_subpixel(&corners[TOP_LEFT]),
        PixelPoint::from_subpixel(&corners[TOP_RIGHT]),
        PixelPoint::from_subpixel(&corners[BOTTOM_RIGHT]),
        PixelPoint::from_subpixel(&corners[BOTTOM_LEFT]),
    ]
}

/// Half-open axis-aligned rectangle: columns `left..right`, rows `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// True when the rectangle covers no pixels.
    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Intersection with a `width x height` image, or `None` if they do not overlap.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let clipped = PixelRect {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(i32::try_from(width).unwrap_or(i32::MAX)),
            bottom: self.bottom.min(i32::try_from(height).unwrap_or(i32::MAX)),
        };
        if clipped.is_degenerate() {
            None
        } else {
            Some(clipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpixel_corners_truncate() {
        let corners: MarkerCorners = [
            Point2::new(10.9, 20.2),
            Point2::new(50.5, 20.7),
            Point2::new(50.1, 60.9),
            Point2::new(10.0, 60.99),
        ];
        let px = corners_to_pixels(&corners);
        assert_eq!(px[TOP_LEFT], PixelPoint::new(10, 20));
        assert_eq!(px[TOP_RIGHT], PixelPoint::new(50, 20));
        assert_eq!(px[BOTTOM_RIGHT], PixelPoint::new(50, 60));
        assert_eq!(px[BOTTOM_LEFT], PixelPoint::new(10, 60));
    }

    #[test]
    fn rect_dimensions_and_degeneracy() {
        let r = PixelRect::new(5, 10, 25, 40);
        assert_eq!(r.width(), 20);
        assert_eq!(r.height(), 30);
        assert!(!r.is_degenerate());
        assert!(r.contains(5, 10));
        assert!(!r.contains(25, 10));

        assert!(PixelRect::new(10, 0, 10, 5).is_degenerate());
        assert!(PixelRect::new(10, 5, 4, 20).is_degenerate());
        assert!(PixelRect::new(0, 8, 4, 2).is_degenerate());
    }

    #[test]
    fn rect_clipping() {
        let r = PixelRect::new(-5, -5, 10, 10);
        assert_eq!(r.clip_to(8, 8), Some(PixelRect::new(0, 0, 8, 8)));
        assert_eq!(PixelRect::new(20, 20, 30, 30).clip_to(8, 8), None);
        let huge = PixelRect::new(-2_000_000_000, 5, 2_000_000_000, i32::MAX);
        assert_eq!(huge.width(), i32::MAX);
        assert_eq!(huge.clip_to(8, 8), Some(PixelRect::new(0, 5, 8, 8)));
    }
}
