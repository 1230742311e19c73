use cv_videoio::{
    backends::{PngSequenceCapture, PngSequenceWriter},
    VideoCapture, VideoError, VideoWriter,
};
use image::{Rgb, RgbImage};
use tempfile::tempdir;

#[test]
fn test_png_sequence_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut writer = PngSequenceWriter::new(dir.path(), "frame").unwrap();
    let width = 64;
    let height = 48;

    for i in 0..5u8 {
        let img = RgbImage::from_pixel(width, height, Rgb([i * 10, 255 - i, 7]));
        writer.write(&img).unwrap();
    }
    assert_eq!(writer.frame_count(), 5);
    assert!(dir.path().join("frame_000004.png").exists());

    let mut capture = PngSequenceCapture::new(dir.path()).unwrap();
    assert!(capture.is_opened());
    assert_eq!(capture.len(), 5);

    for i in 0..5u8 {
        let img = capture.read().unwrap();
        assert_eq!(img.dimensions(), (width, height));
        assert_eq!(*img.get_pixel(0, 0), Rgb([i * 10, 255 - i, 7]));
    }

    assert!(!capture.is_opened());
    assert!(matches!(capture.read(), Err(VideoError::EndOfStream)));
}

#[test]
fn test_png_sequence_skips_non_image_files() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
    RgbImage::new(4, 4).save(dir.path().join("b.png")).unwrap();
    RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])).save(dir.path().join("a.png")).unwrap();

    let mut capture = PngSequenceCapture::new(dir.path()).unwrap();
    assert_eq!(capture.len(), 2);
    assert_eq!(*capture.read().unwrap().get_pixel(0, 0), Rgb([9, 9, 9]));
}

#[test]
fn test_png_sequence_empty_dir() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        PngSequenceCapture::new(dir.path()),
        Err(VideoError::InvalidParameters(_))
    ));
}

#[test]
fn test_png_sequence_invalid_dir() {
    let res = PngSequenceCapture::new("/non/existent/path");
    assert!(matches!(res, Err(VideoError::Io(_))));
}

#[test]
fn test_retrieve_requires_grab() {
    let dir = tempdir().unwrap();
    RgbImage::new(2, 2).save(dir.path().join("f.png")).unwrap();
    let mut capture = PngSequenceCapture::new(dir.path()).unwrap();
    assert!(matches!(capture.retrieve(), Err(VideoError::CaptureFailed(_))));
    capture.grab().unwrap();
    assert!(capture.retrieve().is_ok());
}
