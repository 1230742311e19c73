use crate::{draw_aruco_marker, ArucoDictionary, FeatureError, MarkerId, Result};
use cv_imgproc::{resize, Interpolation};
use image::GrayImage;
use std::path::{Path, PathBuf};

/// A rasterized marker and the file it was written to.
#[derive(Debug, Clone)]
pub struct GeneratedMarker {
    pub id: MarkerId,
    pub image: GrayImage,
    pub path: PathBuf,
}

/// Rasterizes marker `id` as a `size_px x size_px` image.
///
/// The 6x6-cell pattern is drawn at the largest whole cell size that fits and
/// then stretched with nearest-neighbour sampling to the exact size.
pub fn generate_marker_image(
    dictionary: ArucoDictionary,
    id: MarkerId,
    size_px: u32,
) -> Result<GrayImage> {
    let cells = 6;
    if size_px < cells {
        return Err(FeatureError::InvalidParameters(format!(
            "marker size must be at least {cells} pixels, got {size_px}"
        )));
    }
    let marker = draw_aruco_marker(dictionary, id, size_px / cells)?;
    if marker.width() == size_px {
        return Ok(marker);
    }
    Ok(resize(&marker, size_px, size_px, Interpolation::Nearest)?)
}

pub fn marker_file_name(id: MarkerId, name: &str) -> String {
    format!("marker_{id}_{name}.png")
}

/// Writes `image` to `path`; the format follows the extension.
pub fn save_marker_image(image: &GrayImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|source| FeatureError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Generates marker `id` and saves it as `out_dir/marker_<id>_<name>.png`.
pub fn gen_marker(
    dictionary: ArucoDictionary,
    name: &str,
    id: MarkerId,
    size_px: u32,
    out_dir: &Path,
) -> Result<GeneratedMarker> {
    let image = generate_marker_image(dictionary, id, size_px)?;
    let path = out_dir.join(marker_file_name(id, name));
    save_marker_image(&image, &path)?;
    tracing::debug!(%id, path = %path.display(), "marker written");
    Ok(GeneratedMarker { id, image, path })
}
