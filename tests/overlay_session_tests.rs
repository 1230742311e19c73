use aruco_overlay::core::{convert_gray_to_rgb, create_frame, Frame, PixelRect, WHITE};
use aruco_overlay::features::{
    draw_aruco_marker, encode_label, ArucoDetection, ArucoDetector, ArucoDictionary,
    MarkerDetector, MarkerId, OverlayPlacer, OverlayRequest, OverlayStyle, Placement,
};
use aruco_overlay::videoio::backends::{PngSequenceCapture, PngSequenceWriter};
use aruco_overlay::{OverlaySession, SessionStats};
use image::imageops::replace;
use image::{GrayImage, Luma, Rgb, RgbImage};
use nalgebra::Point2;
use std::path::Path;

struct FixedDetector(Vec<ArucoDetection>);

impl MarkerDetector for FixedDetector {
    fn detect(&self, _frame: &Frame) -> aruco_overlay::features::Result<Vec<ArucoDetection>> {
        Ok(self.0.clone())
    }
}

fn detection(id: u16) -> ArucoDetection {
    ArucoDetection {
        id,
        rotation_cw: 0,
        corners: [
            Point2::new(4.0, 4.0),
            Point2::new(20.0, 4.0),
            Point2::new(20.0, 20.0),
            Point2::new(4.0, 20.0),
        ],
        center: Point2::new(12.0, 12.0),
    }
}

fn write_frames(dir: &Path, count: usize) {
    for i in 0..count {
        create_frame(32, 32, WHITE)
            .save(dir.join(format!("in_{i:03}.png")))
            .unwrap();
    }
}

fn written_frames(dir: &Path) -> Vec<RgbImage> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|p| image::open(p).unwrap().to_rgb8())
        .collect()
}

#[test]
fn test_every_frame_is_written_and_matching_ones_overlaid() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_frames(input.path(), 3);
    let overlay_path = input.path().join("overlay.png");
    // Lives next to the frames on purpose; it is read as a frame too.
    RgbImage::from_pixel(8, 8, Rgb([0, 0, 255]))
        .save(&overlay_path)
        .unwrap();

    let placer =
        OverlayPlacer::new(FixedDetector(vec![detection(5)])).with_style(OverlayStyle::plain());
    let session = OverlaySession::new(placer, OverlayRequest::new(MarkerId(5), &overlay_path));

    let mut capture = PngSequenceCapture::new(input.path()).unwrap();
    let mut writer = PngSequenceWriter::new(output.path(), "out").unwrap();
    let stats = session.run(&mut capture, &mut writer).unwrap();

    assert_eq!(
        stats,
        SessionStats {
            frames: 4,
            applied: 4,
            skipped: 0,
            failed: 0
        }
    );
    let frames = written_frames(output.path());
    assert_eq!(frames.len(), 4);
    assert_eq!(*frames[0].get_pixel(10, 10), Rgb([0, 0, 255]));
    assert_eq!(*frames[0].get_pixel(25, 25), WHITE);
}

#[test]
fn test_missing_overlay_fails_per_frame_without_stopping() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_frames(input.path(), 3);

    let placer = OverlayPlacer::new(FixedDetector(vec![detection(5)]));
    let missing = input.path().join("missing.png");
    let session = OverlaySession::new(placer, OverlayRequest::new(MarkerId(5), missing));

    let mut capture = PngSequenceCapture::new(input.path()).unwrap();
    let mut writer = PngSequenceWriter::new(output.path(), "out").unwrap();
    let stats = session.run(&mut capture, &mut writer).unwrap();

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(writer.frame_count(), 3);
    for frame in written_frames(output.path()) {
        assert!(frame.pixels().all(|p| *p == WHITE));
    }
}

#[test]
fn test_mismatching_marker_passes_frames_through() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_frames(input.path(), 2);

    let placer = OverlayPlacer::new(FixedDetector(vec![detection(9)]));
    let request = OverlayRequest::new(MarkerId(5), input.path().join("x.png"));
    let session = OverlaySession::new(placer, request);

    let mut capture = PngSequenceCapture::new(input.path()).unwrap();
    let mut writer = PngSequenceWriter::new(output.path(), "out").unwrap();
    let stats = session.run(&mut capture, &mut writer).unwrap();

    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.applied + stats.failed, 0);
    assert_eq!(writer.frame_count(), 2);
}

#[test]
fn test_undecodable_frame_is_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_frames(input.path(), 2);
    std::fs::write(input.path().join("in_001_broken.png"), b"junk").unwrap();

    let placer = OverlayPlacer::new(FixedDetector(Vec::new()));
    let request = OverlayRequest::new(MarkerId(1), input.path().join("x.png"));
    let session = OverlaySession::new(placer, request);

    let mut capture = PngSequenceCapture::new(input.path()).unwrap();
    let mut writer = PngSequenceWriter::new(output.path(), "out").unwrap();
    let stats = session.run(&mut capture, &mut writer).unwrap();

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(writer.frame_count(), 2);
}

#[test]
fn test_process_frame_with_real_detector() {
    let id = encode_label("dog").unwrap();
    let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, id, 10).unwrap();
    let mut gray = GrayImage::from_pixel(200, 160, Luma([255]));
    replace(&mut gray, &marker, 70, 50);
    let mut frame = convert_gray_to_rgb(&gray);

    let dir = tempfile::tempdir().unwrap();
    let overlay_path = dir.path().join("overlay.png");
    RgbImage::from_pixel(10, 10, Rgb([200, 30, 30]))
        .save(&overlay_path)
        .unwrap();

    let placer = OverlayPlacer::new(ArucoDetector::default());
    let session = OverlaySession::new(placer, OverlayRequest::new(id, &overlay_path));
    let mut stats = SessionStats::default();
    session.process_frame(&mut frame, &mut stats);

    assert_eq!(stats.applied, 1);
    assert_eq!(*frame.get_pixel(100, 80), Rgb([200, 30, 30]));

    let placer = OverlayPlacer::new(ArucoDetector::default());
    let mut again = convert_gray_to_rgb(&gray);
    assert_eq!(
        placer.place_request(&mut again, session.request()).unwrap(),
        Placement::Applied {
            id,
            rect: PixelRect::new(70, 50, 129, 109)
        }
    );
}
