use crate::{FeatureError, MarkerId, Result};
use cv_core::{convert_rgb_to_gray, Frame, MarkerCorners};
use image::{GrayImage, Luma};
use nalgebra::Point2;
use std::collections::VecDeque;
use std::sync::OnceLock;

const PAYLOAD_BITS: usize = 4;
const BORDER_BITS: usize = 1;
const GRID: usize = PAYLOAD_BITS + 2 * BORDER_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArucoDictionary {
    /// 4x4 payload, 50 symbols. Same codes as the first 50 of `Dict4x4_250`.
    Dict4x4_50,
    /// 4x4 payload, 250 symbols.
    #[default]
    Dict4x4_250,
}

impl ArucoDictionary {
    pub fn size(self) -> usize {
        match self {
            ArucoDictionary::Dict4x4_50 => 50,
            ArucoDictionary::Dict4x4_250 => 250,
        }
    }

    pub fn contains(self, id: MarkerId) -> bool {
        (id.value() as usize) < self.size()
    }

    fn codes(self) -> &'static [u64] {
        static CODES_4X4: OnceLock<Vec<u64>> = OnceLock::new();
        let all = CODES_4X4.get_or_init(|| {
            generate_dictionary_codes(PAYLOAD_BITS * PAYLOAD_BITS, 250, 0xA53A_9E37_5D1Cu64)
        });
        &all[..self.size()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArucoDetection {
    pub id: u16,
    pub rotation_cw: u8,
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: MarkerCorners,
    pub center: Point2<f32>,
}

impl ArucoDetection {
    pub fn marker_id(&self) -> MarkerId {
        MarkerId::from(self.id)
    }
}

/// Tunables for candidate search and decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParameters {
    /// Pixels at or below this intensity count as marker ink.
    pub dark_threshold: u8,
    /// Smallest accepted bounding-box side in pixels.
    pub min_side: u32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Accepted range for dark pixels over bounding-box area.
    pub min_fill: f32,
    pub max_fill: f32,
    /// Bit errors tolerated when matching a payload against the dictionary.
    pub max_hamming: u32,
}

impl Default for DetectorParameters {
    fn default() -> Self {
        Self {
            dark_threshold: 80,
            min_side: GRID as u32,
            min_aspect_ratio: 0.7,
            max_aspect_ratio: 1.3,
            min_fill: 0.18,
            max_fill: 0.95,
            max_hamming: 0,
        }
    }
}

/// Finds markers in a frame. Results come back in a stable order; callers
/// that only look at one marker use the first.
pub trait MarkerDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<ArucoDetection>>;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &T {
    fn detect(&self, frame: &Frame) -> Result<Vec<ArucoDetection>> {
        (**self).detect(frame)
    }
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for Box<T> {
    fn detect(&self, frame: &Frame) -> Result<Vec<ArucoDetection>> {
        (**self).detect(frame)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArucoDetector {
    pub dictionary: ArucoDictionary,
    pub params: DetectorParameters,
}

impl ArucoDetector {
    pub fn new(dictionary: ArucoDictionary, params: DetectorParameters) -> Self {
        Self { dictionary, params }
    }
}

impl MarkerDetector for ArucoDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<ArucoDetection>> {
        let gray = convert_rgb_to_gray(frame);
        detect_aruco_markers_with(&gray, self.dictionary, &self.params)
    }
}

/// Rasterizes marker `id` with one border cell and `cell_size` pixels per cell.
pub fn draw_aruco_marker(
    dictionary: ArucoDictionary,
    id: MarkerId,
    cell_size: u32,
) -> Result<GrayImage> {
    if cell_size == 0 {
        return Err(FeatureError::InvalidParameters(
            "cell_size must be >= 1".to_string(),
        ));
    }
    let code = dictionary
        .codes()
        .get(id.value() as usize)
        .copied()
        .ok_or(FeatureError::InvalidMarkerId {
            id: id.value(),
            dictionary_size: dictionary.size(),
        })?;
    Ok(draw_marker_bits(code, cell_size))
}

pub fn detect_aruco_markers(
    image: &GrayImage,
    dictionary: ArucoDictionary,
) -> Result<Vec<ArucoDetection>> {
    detect_aruco_markers_with(image, dictionary, &DetectorParameters::default())
}

pub fn detect_aruco_markers_with(
    image: &GrayImage,
    dictionary: ArucoDictionary,
    params: &DetectorParameters,
) -> Result<Vec<ArucoDetection>> {
    use cv_core::init_global_thread_pool;
    use rayon::prelude::*;

    let codes = dictionary.codes();
    let candidates = find_marker_candidates(image, params)?;

    // Respects RUSTCV_CPU_THREADS on first use.
    let _ = init_global_thread_pool(None);

    let detections: Vec<ArucoDetection> = candidates
        .par_iter()
        .filter_map(|c| {
            let bits = sample_grid_bits(image, c);
            if !border_is_black(&bits) {
                return None;
            }
            let payload = extract_payload(&bits);
            let (id, rot, dist) = decode_code_with_rotations(payload, codes);
            if dist <= params.max_hamming {
                Some(ArucoDetection {
                    id: id as u16,
                    rotation_cw: rot as u8,
                    corners: candidate_corners(c),
                    center: candidate_center(c),
                })
            } else {
                None
            }
        })
        .collect();

    tracing::debug!(
        candidates = candidates.len(),
        detections = detections.len(),
        "aruco detection"
    );
    Ok(detections)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

fn draw_marker_bits(code: u64, cell_size: u32) -> GrayImage {
    let size = (GRID as u32) * cell_size;
    let mut img = GrayImage::from_pixel(size, size, Luma([255]));

    for gy in 0..GRID {
        for gx in 0..GRID {
            let is_border = gy < BORDER_BITS
                || gx < BORDER_BITS
                || gy >= GRID - BORDER_BITS
                || gx >= GRID - BORDER_BITS;
            let is_black = if is_border {
                true
            } else {
                let bit_idx = (gy - BORDER_BITS) * PAYLOAD_BITS + (gx - BORDER_BITS);
                ((code >> bit_idx) & 1) == 1
            };
            if !is_black {
                continue;
            }
            let x0 = gx as u32 * cell_size;
            let y0 = gy as u32 * cell_size;
            for y in y0..(y0 + cell_size) {
                for x in x0..(x0 + cell_size) {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }
    img
}

// Connected components of dark pixels, filtered by bounding-box shape and fill.
// Output is in raster order of each component's first pixel.
fn find_marker_candidates(
    image: &GrayImage,
    params: &DetectorParameters,
) -> Result<Vec<Candidate>> {
    let w = image.width() as usize;
    let h = image.height() as usize;
    if w == 0 || h == 0 {
        return Err(FeatureError::DetectionError("empty image".to_string()));
    }
    let min_side = params.min_side.max(GRID as u32);
    let dark = params.dark_threshold;
    let mut visited = vec![false; w * h];
    let mut out = Vec::new();
    let raw = image.as_raw();

    for y0 in 0..h {
        for x0 in 0..w {
            let idx0 = y0 * w + x0;
            if visited[idx0] || raw[idx0] > dark {
                continue;
            }
            let mut q = VecDeque::new();
            q.push_back((x0, y0));
            visited[idx0] = true;

            let mut count = 0usize;
            let mut c = Candidate {
                min_x: x0 as u32,
                min_y: y0 as u32,
                max_x: x0 as u32,
                max_y: y0 as u32,
            };

            while let Some((x, y)) = q.pop_front() {
                count += 1;
                c.min_x = c.min_x.min(x as u32);
                c.min_y = c.min_y.min(y as u32);
                c.max_x = c.max_x.max(x as u32);
                c.max_y = c.max_y.max(y as u32);

                let neighbours = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = ny * w + nx;
                    if visited[nidx] || raw[nidx] > dark {
                        continue;
                    }
                    visited[nidx] = true;
                    q.push_back((nx, ny));
                }
            }

            let bw = c.max_x - c.min_x + 1;
            let bh = c.max_y - c.min_y + 1;
            if bw < min_side || bh < min_side {
                continue;
            }
            let ratio = bw as f32 / bh as f32;
            if !(params.min_aspect_ratio..=params.max_aspect_ratio).contains(&ratio) {
                continue;
            }
            let fill = count as f32 / ((bw as usize) * (bh as usize)) as f32;
            if !(params.min_fill..=params.max_fill).contains(&fill) {
                continue;
            }

            out.push(c);
        }
    }

    Ok(out)
}

fn sample_grid_bits(image: &GrayImage, c: &Candidate) -> [u8; GRID * GRID] {
    let mut bits = [0u8; GRID * GRID];
    let bw = (c.max_x - c.min_x + 1) as f32;
    let bh = (c.max_y - c.min_y + 1) as f32;
    let g = GRID as f32;

    for gy in 0..GRID {
        for gx in 0..GRID {
            let x0 = c.min_x as f32 + (gx as f32) * bw / g;
            let x1 = c.min_x as f32 + ((gx + 1) as f32) * bw / g;
            let y0 = c.min_y as f32 + (gy as f32) * bh / g;
            let y1 = c.min_y as f32 + ((gy + 1) as f32) * bh / g;
            let sx0 = x0.floor().clamp(0.0, (image.width() - 1) as f32) as u32;
            let sx1 = x1.ceil().clamp(0.0, image.width() as f32) as u32;
            let sy0 = y0.floor().clamp(0.0, (image.height() - 1) as f32) as u32;
            let sy1 = y1.ceil().clamp(0.0, image.height() as f32) as u32;
            let mut black = 0usize;
            let mut total = 0usize;
            for y in sy0..sy1 {
                for x in sx0..sx1 {
                    total += 1;
                    if image.get_pixel(x, y)[0] < 128 {
                        black += 1;
                    }
                }
            }
            bits[gy * GRID + gx] = u8::from(black * 2 >= total.max(1));
        }
    }
    bits
}

fn border_is_black(bits: &[u8; GRID * GRID]) -> bool {
    (0..GRID).all(|i| {
        bits[i] != 0
            && bits[(GRID - 1) * GRID + i] != 0
            && bits[i * GRID] != 0
            && bits[i * GRID + (GRID - 1)] != 0
    })
}

fn extract_payload(bits: &[u8; GRID * GRID]) -> u64 {
    let mut code = 0u64;
    for y in 0..PAYLOAD_BITS {
        for x in 0..PAYLOAD_BITS {
            if bits[(y + BORDER_BITS) * GRID + (x + BORDER_BITS)] != 0 {
                code |= 1u64 << (y * PAYLOAD_BITS + x);
            }
        }
    }
    code
}

// Best (id, rotation, hamming distance) over all codes and quarter turns.
fn decode_code_with_rotations(code: u64, dict: &[u64]) -> (usize, usize, u32) {
    let mut best = (0usize, 0usize, u32::MAX);
    let rots = rotate_code_variants(code, PAYLOAD_BITS);
    for (id, dcode) in dict.iter().enumerate() {
        for (rot, rc) in rots.iter().enumerate() {
            let dist = (rc ^ dcode).count_ones();
            if dist < best.2 {
                best = (id, rot, dist);
            }
        }
    }
    best
}

fn rotate_code_variants(code: u64, side: usize) -> [u64; 4] {
    let mut out = [code; 4];
    for i in 1..4 {
        out[i] = rotate_code_90(out[i - 1], side);
    }
    out
}

fn rotate_code_90(code: u64, side: usize) -> u64 {
    let mut out = 0u64;
    for y in 0..side {
        for x in 0..side {
            if (code >> (y * side + x)) & 1 != 0 {
                let nx = side - 1 - y;
                let ny = x;
                out |= 1u64 << (ny * side + nx);
            }
        }
    }
    out
}

// Deterministic LCG-driven code list. Codes are canonical under rotation and unique.
fn generate_dictionary_codes(bits: usize, count: usize, seed: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(count);
    let mut state = seed;
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let side = (bits as f32).sqrt().round() as usize;
    while out.len() < count {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let code = state & mask;
        // Avoid trivial patterns.
        if code == 0 || code == mask {
            continue;
        }
        // Ensure mixed density.
        let ones = code.count_ones() as usize;
        if ones < bits / 4 || ones > bits * 3 / 4 {
            continue;
        }
        let canonical = rotate_code_variants(code, side)
            .into_iter()
            .min()
            .unwrap_or(code);
        if out.contains(&canonical) {
            continue;
        }
        out.push(canonical);
    }
    out
}

fn candidate_corners(c: &Candidate) -> MarkerCorners {
    [
        Point2::new(c.min_x as f32, c.min_y as f32),
        Point2::new(c.max_x as f32, c.min_y as f32),
        Point2::new(c.max_x as f32, c.max_y as f32),
        Point2::new(c.min_x as f32, c.max_y as f32),
    ]
}

fn candidate_center(c: &Candidate) -> Point2<f32> {
    Point2::new(
        (c.min_x + c.max_x) as f32 * 0.5,
        (c.min_y + c.max_y) as f32 * 0.5,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops::replace;

    #[test]
    fn dictionary_codes_are_unique_and_rotation_distinct() {
        let codes = ArucoDictionary::Dict4x4_250.codes();
        assert_eq!(codes.len(), 250);
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert!(rotate_code_variants(*a, PAYLOAD_BITS).iter().all(|r| r != b));
            }
        }
    }

    #[test]
    fn small_dictionary_is_prefix_of_large() {
        let small = ArucoDictionary::Dict4x4_50.codes();
        let large = ArucoDictionary::Dict4x4_250.codes();
        assert_eq!(small, &large[..50]);
    }

    #[test]
    fn draw_rejects_ids_outside_dictionary() {
        assert!(matches!(
            draw_aruco_marker(ArucoDictionary::Dict4x4_50, MarkerId(50), 10),
            Err(FeatureError::InvalidMarkerId { id: 50, dictionary_size: 50 })
        ));
        assert!(draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(249), 10).is_ok());
    }

    #[test]
    fn drawn_marker_has_black_border() {
        let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(3), 5).unwrap();
        assert_eq!(marker.dimensions(), (30, 30));
        for i in 0..30 {
            assert_eq!(marker.get_pixel(i, 0)[0], 0);
            assert_eq!(marker.get_pixel(0, i)[0], 0);
            assert_eq!(marker.get_pixel(i, 29)[0], 0);
            assert_eq!(marker.get_pixel(29, i)[0], 0);
        }
    }

    #[test]
    fn aruco_draw_and_detect_single_marker() {
        let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(7), 10).unwrap();
        let mut canvas = GrayImage::from_pixel(180, 140, Luma([255]));
        replace(&mut canvas, &marker, 30, 20);

        let det = detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250).unwrap();
        assert_eq!(det.len(), 1);
        assert_eq!(det[0].id, 7);
        assert_eq!(det[0].rotation_cw, 0);
        assert_eq!(det[0].corners[0], Point2::new(30.0, 20.0));
        assert_eq!(det[0].corners[1], Point2::new(89.0, 20.0));
        assert_eq!(det[0].corners[2], Point2::new(89.0, 79.0));
        assert_eq!(det[0].corners[3], Point2::new(30.0, 79.0));
    }

    #[test]
    fn detection_covers_the_whole_dictionary_range() {
        for id in [0u32, 49, 123, 200, 249] {
            let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(id), 8).unwrap();
            let mut canvas = GrayImage::from_pixel(120, 120, Luma([255]));
            replace(&mut canvas, &marker, 25, 30);
            let det = detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250).unwrap();
            assert!(det.iter().any(|d| u32::from(d.id) == id), "id {id} not detected");
        }
    }

    #[test]
    fn multiple_markers_come_back_in_raster_order() {
        let mut canvas = GrayImage::from_pixel(400, 300, Luma([255]));
        let placements = [(5u32, 220i64, 20i64), (10, 20, 40), (15, 120, 160)];
        for &(id, x, y) in &placements {
            let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(id), 10).unwrap();
            replace(&mut canvas, &marker, x, y);
        }

        let detections = detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250).unwrap();
        let ids: Vec<u16> = detections.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![5, 10, 15]);
    }

    #[test]
    fn rotated_marker_reports_rotation() {
        let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(42), 10).unwrap();
        let rotated = image::imageops::rotate90(&marker);
        let mut canvas = GrayImage::from_pixel(120, 120, Luma([255]));
        replace(&mut canvas, &rotated, 30, 30);
        let det = detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250).unwrap();
        assert_eq!(det.len(), 1);
        assert_eq!(det[0].id, 42);
    }

    #[test]
    fn marker_detection_empty_candidates() {
        let canvas = GrayImage::from_pixel(200, 200, Luma([255]));
        let det = detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250).unwrap();
        assert!(det.is_empty());
    }

    #[test]
    fn empty_image_is_an_error() {
        let canvas = GrayImage::new(0, 0);
        assert!(matches!(
            detect_aruco_markers(&canvas, ArucoDictionary::Dict4x4_250),
            Err(FeatureError::DetectionError(_))
        ));
    }

    #[test]
    fn frame_detector_converts_color_frames() {
        let marker = draw_aruco_marker(ArucoDictionary::Dict4x4_250, MarkerId(190), 10).unwrap();
        let mut gray = GrayImage::from_pixel(160, 120, Luma([255]));
        replace(&mut gray, &marker, 40, 30);
        let frame = cv_core::convert_gray_to_rgb(&gray);

        let detector = ArucoDetector::default();
        let det = detector.detect(&frame).unwrap();
        assert_eq!(det.len(), 1);
        assert_eq!(det[0].marker_id(), MarkerId(190));
    }
}
