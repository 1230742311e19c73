use image::{GrayImage, Rgb, RgbImage};

/// One captured video frame. The capture loop owns it; processing stages
/// borrow it mutably and edit pixels in place.
pub type Frame = RgbImage;

/// An RGB colour in frame channel order.
pub type Color = Rgb<u8>;

pub const RED: Color = Rgb([255, 0, 0]);
pub const GREEN: Color = Rgb([0, 255, 0]);
pub const BLUE: Color = Rgb([0, 0, 255]);
pub const WHITE: Color = Rgb([255, 255, 255]);
pub const BLACK: Color = Rgb([0, 0, 0]);

pub fn create_frame(width: u32, height: u32, fill: Color) -> Frame {
    RgbImage::from_pixel(width, height, fill)
}

pub fn convert_rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    image::imageops::colorops::grayscale(rgb)
}

pub fn convert_gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut out = RgbImage::new(gray.width(), gray.height());
    for (dst, src) in out.pixels_mut().zip(gray.pixels()) {
        let v = src[0];
        *dst = Rgb([v, v, v]);
    }
    out
}

/// Writes `color` at `(x, y)`; coordinates outside the image are ignored.
pub fn put_pixel_clipped(img: &mut RgbImage, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    img.put_pixel(x as u32, y as u32, color);
}
