use crate::{validate_image_size, ImgprocError, Result};
use image::{GrayImage, RgbImage};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Axis-aligned resize of a grayscale image to exactly `width x height`.
pub fn resize(
    src: &GrayImage,
    width: u32,
    height: u32,
    interpolation: Interpolation,
) -> Result<GrayImage> {
    validate_image_size(width, height)?;
    check_source(src.width(), src.height())?;
    let data = resize_raw(
        src.as_raw(),
        (src.width() as usize, src.height() as usize),
        1,
        (width as usize, height as usize),
        full_window(width, height),
        interpolation,
    );
    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| ImgprocError::ImageError("resized buffer has wrong length".into()))
}

/// Axis-aligned resize of an RGB image to exactly `width x height`.
///
/// The stretch is independent per axis, so aspect ratio is not preserved.
pub fn resize_rgb(
    src: &RgbImage,
    width: u32,
    height: u32,
    interpolation: Interpolation,
) -> Result<RgbImage> {
    resize_rgb_window(src, width, height, full_window(width, height), interpolation)
}

/// The `window` part of `resize_rgb(src, width, height, ..)`, computed without
/// materializing the rest. `window` is in destination pixels and must lie
/// inside `width x height`.
pub fn resize_rgb_window(
    src: &RgbImage,
    width: u32,
    height: u32,
    window: ResizeWindow,
    interpolation: Interpolation,
) -> Result<RgbImage> {
    validate_image_size(width, height)?;
    validate_image_size(window.width, window.height)?;
    check_source(src.width(), src.height())?;
    if window.x.checked_add(window.width).map_or(true, |r| r > width)
        || window.y.checked_add(window.height).map_or(true, |b| b > height)
    {
        return Err(ImgprocError::DimensionMismatch(format!(
            "window {window:?} exceeds {width}x{height}"
        )));
    }
    let data = resize_raw(
        src.as_raw(),
        (src.width() as usize, src.height() as usize),
        3,
        (width as usize, height as usize),
        window,
        interpolation,
    );
    RgbImage::from_raw(window.width, window.height, data)
        .ok_or_else(|| ImgprocError::ImageError("resized buffer has wrong length".into()))
}

/// Sub-rectangle of a resize target, in destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn full_window(width: u32, height: u32) -> ResizeWindow {
    ResizeWindow {
        x: 0,
        y: 0,
        width,
        height,
    }
}

fn check_source(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ImgprocError::ImageError("cannot resize an empty image".into()));
    }
    Ok(())
}

fn resize_raw(
    src: &[u8],
    (src_w, src_h): (usize, usize),
    channels: usize,
    (dst_w, dst_h): (usize, usize),
    window: ResizeWindow,
    interpolation: Interpolation,
) -> Vec<u8> {
    let (win_x, win_y) = (window.x as usize, window.y as usize);
    let (win_w, win_h) = (window.width as usize, window.height as usize);
    let mut dst = vec![0u8; win_w * win_h * channels];
    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;
    let stride = src_w * channels;

    dst.par_chunks_mut(win_w * channels)
        .enumerate()
        .for_each(|(row_idx, row)| {
            let y = win_y + row_idx;
            match interpolation {
                Interpolation::Nearest => {
                    let sy = ((y as f32 * scale_y).floor() as usize).min(src_h - 1);
                    for i in 0..win_w {
                        let x = win_x + i;
                        let sx = ((x as f32 * scale_x).floor() as usize).min(src_w - 1);
                        let s = sy * stride + sx * channels;
                        row[i * channels..(i + 1) * channels]
                            .copy_from_slice(&src[s..s + channels]);
                    }
                }
                Interpolation::Linear => {
                    let (y0, y1, dy) = linear_taps(y, scale_y, src_h);
                    for i in 0..win_w {
                        let (x0, x1, dx) = linear_taps(win_x + i, scale_x, src_w);
                        for c in 0..channels {
                            let v00 = src[y0 * stride + x0 * channels + c] as f32;
                            let v10 = src[y0 * stride + x1 * channels + c] as f32;
                            let v01 = src[y1 * stride + x0 * channels + c] as f32;
                            let v11 = src[y1 * stride + x1 * channels + c] as f32;

                            let v0 = v00 * (1.0 - dx) + v10 * dx;
                            let v1 = v01 * (1.0 - dx) + v11 * dx;
                            let v = v0 * (1.0 - dy) + v1 * dy;

                            row[i * channels + c] = v.round().clamp(0.0, 255.0) as u8;
                        }
                    }
                }
            }
        });

    dst
}

// Pixel-centre aligned source taps for destination index `i`.
fn linear_taps(i: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let f = ((i as f32 + 0.5) * scale - 0.5).max(0.0);
    let i0 = (f.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    (i0, i1, f - i0 as f32)
}
