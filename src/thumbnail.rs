use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::instrument;

use crate::{
    error::{Error, Result},
    util::files_with_extension,
};

pub const MAX_WIDTH: u32 = 640;
pub const MAX_HEIGHT: u32 = 480;

pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Thumbnail size keeping the aspect ratio, never larger than the source.
///
/// Landscape images are sized by width, everything else by height, then both
/// sides are clamped to the bounds.
pub fn thumbnail_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scaled = |side: u32, numerator: u32, denominator: u32| {
        (side as u64 * numerator as u64 / denominator.max(1) as u64) as u32
    };
    let (new_width, new_height) = if width > height {
        let new_width = max_width.min(width);
        (new_width, scaled(new_width, height, width))
    } else {
        let new_height = max_height.min(height);
        (scaled(new_height, width, height), new_height)
    };
    (
        new_width.min(max_width).max(1),
        new_height.min(max_height).max(1),
    )
}

/// Writes a thumbnail of every JPEG in `input_dir` into `output_dir`, under the same name.
#[instrument(level = "debug")]
pub fn generate_thumbnails(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|err| Error::io(output_dir, err))?;
    let images = files_with_extension(input_dir, JPEG_EXTENSIONS)?;
    let total = images.len();
    let mut written = Vec::with_capacity(total);
    for (i, path) in images.iter().enumerate() {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        tracing::info!(
            "Generating thumbnail {} of {total}: {}",
            i + 1,
            file_name.to_string_lossy()
        );
        let image = image::open(path).map_err(|err| Error::image(path, err))?;
        let (width, height) = thumbnail_size(image.width(), image.height(), MAX_WIDTH, MAX_HEIGHT);
        let thumbnail = image.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();
        let target = output_dir.join(file_name);
        thumbnail
            .save(&target)
            .map_err(|err| Error::image(&target, err))?;
        written.push(target);
    }
    Ok(written)
}
