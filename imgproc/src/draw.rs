//! Raster drawing primitives for annotating RGB frames.
//!
//! Every primitive clips against the image bounds, so shapes may extend
//! past the edges.

use cv_core::{put_pixel_clipped, Color, PixelPoint, PixelRect};
use image::RgbImage;

pub fn draw_filled_circle(img: &mut RgbImage, center: PixelPoint, radius: i32, color: Color) {
    let r = i64::from(radius.max(0));
    let (cx, cy) = (i64::from(center.x), i64::from(center.y));
    let (x_lo, x_hi) = ((cx - r).max(0), (cx + r).min(i64::from(img.width()) - 1));
    let (y_lo, y_hi) = ((cy - r).max(0), (cy + r).min(i64::from(img.height()) - 1));
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Bresenham line, stamped with a `thickness x thickness` square brush.
///
/// Segments reaching far outside the image are first cut to its bounds, so
/// cost follows the visible length.
pub fn draw_line(
    img: &mut RgbImage,
    p1: PixelPoint,
    p2: PixelPoint,
    color: Color,
    thickness: u32,
) {
    let t = thickness.clamp(1, 1024) as i32;
    let lo = -(t / 2);
    let hi = lo + t;

    let bounds = PixelRect::new(
        -t,
        -t,
        (img.width() as i32).saturating_add(t),
        (img.height() as i32).saturating_add(t),
    );
    let Some((p1, p2)) = clip_segment(p1, p2, bounds) else {
        return;
    };

    let (mut x0, mut y0) = (p1.x, p1.y);
    let (x1, y1) = (p2.x, p2.y);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for oy in lo..hi {
            for ox in lo..hi {
                put_pixel_clipped(img, x0 + ox, y0 + oy, color);
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

// Liang-Barsky against the half-open `bounds`. Segments already inside are
// returned untouched.
fn clip_segment(
    p1: PixelPoint,
    p2: PixelPoint,
    bounds: PixelRect,
) -> Option<(PixelPoint, PixelPoint)> {
    if bounds.contains(p1.x, p1.y) && bounds.contains(p2.x, p2.y) {
        return Some((p1, p2));
    }
    let (x0, y0) = (f64::from(p1.x), f64::from(p1.y));
    let dx = f64::from(p2.x) - x0;
    let dy = f64::from(p2.y) - y0;
    let (xmin, ymin) = (f64::from(bounds.left), f64::from(bounds.top));
    let (xmax, ymax) = (f64::from(bounds.right) - 1.0, f64::from(bounds.bottom) - 1.0);

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0 - xmin), (dx, xmax - x0), (-dy, y0 - ymin), (dy, ymax - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| PixelPoint::new((x0 + t * dx).round() as i32, (y0 + t * dy).round() as i32);
    Some((at(t0), at(t1)))
}

/// Connects `points` in order and closes the loop back to the first one.
pub fn draw_closed_polyline(
    img: &mut RgbImage,
    points: &[PixelPoint],
    color: Color,
    thickness: u32,
) {
    if points.len() < 2 {
        return;
    }
    for (i, &p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        draw_line(img, p, q, color, thickness);
    }
}

const GLYPH_W: i32 = 3;
const GLYPH_H: i32 = 5;

// 3x5 bitmaps, one row per entry, most significant of the low 3 bits on the left.
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    };
    Some(rows)
}

/// Renders `text` with a built-in 3x5 digit font. `origin` is the bottom-left
/// corner of the text, matching a baseline-anchored label. Characters without
/// a glyph advance the cursor and draw nothing.
pub fn draw_text(img: &mut RgbImage, text: &str, origin: PixelPoint, scale: u32, color: Color) {
    let s = i64::from(scale.clamp(1, 1024));
    let top = i64::from(origin.y) - i64::from(GLYPH_H) * s;
    let mut cursor = i64::from(origin.x);

    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (gy, bits) in rows.iter().enumerate() {
                for gx in 0..GLYPH_W {
                    if (*bits >> (GLYPH_W - 1 - gx)) & 1 == 0 {
                        continue;
                    }
                    let x0 = cursor + i64::from(gx) * s;
                    let y0 = top + gy as i64 * s;
                    for y in y0..y0 + s {
                        for x in x0..x0 + s {
                            if let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) {
                                put_pixel_clipped(img, x, y, color);
                            }
                        }
                    }
                }
            }
        }
        cursor += i64::from(GLYPH_W + 1) * s;
    }
}

/// Copies `src` into `dst` with its top-left at `(left, top)`, replacing the
/// destination pixels outright. Parts of `src` falling outside `dst` are
/// dropped. Returns the number of pixels written.
pub fn blit_rgb(dst: &mut RgbImage, src: &RgbImage, left: i32, top: i32) -> usize {
    let placed = PixelRect::new(
        left,
        top,
        left.saturating_add(src.width() as i32),
        top.saturating_add(src.height() as i32),
    );
    let Some(visible) = placed.clip_to(dst.width(), dst.height()) else {
        return 0;
    };
    for y in visible.top..visible.bottom {
        for x in visible.left..visible.right {
            let pixel = *src.get_pixel((x - left) as u32, (y - top) as u32);
            dst.put_pixel(x as u32, y as u32, pixel);
        }
    }
    (visible.width() as usize) * (visible.height() as usize)
}
