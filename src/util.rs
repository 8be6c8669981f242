use std::path::{Path, PathBuf};

use geo::{
    point, Area, BoundingRect, Contains, Coord, EuclideanLength, HasDimensions, LineString,
    MinimumRotatedRect, Polygon, Translate,
};
use geo_clipper::{Clipper, EndType, JoinType};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, Rgb};
use imageproc::point::Point;
use ndarray::{s, Array3, ArrayView2, Axis};
use tracing::instrument;

use crate::error::{Error, Result};

/// Files directly inside `dir` whose extension matches one of `extensions`
/// (case-insensitive), sorted by name.
pub(crate) fn files_with_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
        let path = entry.map_err(|err| Error::io(dir, err))?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|it| it.eq_ignore_ascii_case(ext)));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[instrument(level = "trace", skip(image))]
pub(crate) fn subtract_mean_normalize(
    image: &DynamicImage,
    mean_vals: &[f32; 3],
    norm_vals: &[f32; 3],
) -> Array3<f32> {
    let mut image = image.to_rgb32f();
    let norm = Rgb::<f32>(*norm_vals);
    let mean_vals = Rgb::<f32>(*mean_vals).map2(&norm, |c1, c2| c1 * c2);
    for pixel in image.pixels_mut() {
        *pixel = pixel
            .map2(&norm, |c1, c2| c1 * c2)
            .map2(&mean_vals, |c1, c2| c1 - c2);
    }
    Array3::<f32>::from_shape_fn(
        (3, image.height() as usize, image.width() as usize),
        |(ch, y, x)| image.get_pixel(x as u32, y as u32).channels()[ch],
    )
}

pub(crate) fn to_luma_image(data: ArrayView2<f32>) -> Option<GrayImage> {
    let height = data.len_of(Axis(0));
    let width = data.len_of(Axis(1));
    let pixel_data = data
        .axis_iter(Axis(0))
        .flat_map(|it| it.into_iter())
        .map(|p| (p.clamp(0.0, 1.0) * 255.0) as u8)
        .collect::<Vec<u8>>();
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
}

pub(crate) fn to_geo_poly(points: &[Point<i32>]) -> Polygon<f32> {
    let points = points
        .iter()
        .map(|point| Coord {
            x: point.x as f32,
            y: point.y as f32,
        })
        .collect();
    Polygon::new(LineString::new(points), vec![])
}

pub(crate) fn max_side(rect: &Polygon<f32>) -> f32 {
    rect.exterior()
        .lines()
        .map(|it| it.euclidean_length())
        .fold(0.0, f32::max)
}

/// Mean probability of the prediction map inside `rect`.
pub(crate) fn box_score_fast(rect: &Polygon<f32>, pred_data: ArrayView2<f32>) -> f32 {
    let Some(bounds) = rect.bounding_rect() else {
        return 0.0;
    };
    let (rows, cols) = pred_data.dim();
    let min = bounds.min();
    let max = bounds.max();
    let (x0, y0) = (min.x.max(0.0) as usize, min.y.max(0.0) as usize);
    let (x1, y1) = ((max.x as usize).min(cols), (max.y as usize).min(rows));
    if x0 >= x1 || y0 >= y1 {
        return 0.0;
    }

    let sliced = pred_data.slice(s![y0..y1, x0..x1]);
    let local_rect = rect.translate(-(x0 as f32), -(y0 as f32));

    let (sum, len) = sliced
        .indexed_iter()
        .filter(|((y, x), _)| local_rect.contains(&point![x: *x as f32, y: *y as f32]))
        .fold((0.0, 0usize), |(sum, len), (_, value)| (sum + *value, len + 1));
    if len == 0 {
        0.0
    } else {
        sum / len as f32
    }
}

/// Grows a detected box outwards, DBNet boxes hug the glyph cores.
pub(crate) fn unclip(rect: Polygon<f32>, unclip_ratio: f32) -> Option<Polygon<f32>> {
    let distance = (rect.unsigned_area() * unclip_ratio) / rect.exterior().euclidean_length();

    let clipped_rect = rect.offset(distance, JoinType::Round(0.25), EndType::ClosedPolygon, 1.0);

    if clipped_rect.is_empty() {
        None
    } else {
        clipped_rect.minimum_rotated_rect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub factor_x: f32,
    pub factor_y: f32,
    pub target_width: u32,
    pub target_height: u32,
}

/// Detector input size for a crop magnified by `upscale_ratio`.
///
/// Both sides are rounded up to a multiple of 32 as DBNet requires, then
/// capped at `max_side_len`. The factors map detector coordinates back onto
/// the original crop.
pub fn scale_for_detection(width: u32, height: u32, upscale_ratio: f32, max_side_len: u32) -> Scale {
    let upscale_ratio = if upscale_ratio > 0.0 { upscale_ratio } else { 1.0 };
    let cap = (max_side_len / 32 * 32).max(32);
    let fit = |side: u32| {
        let side = (side as f32 * upscale_ratio).ceil() as u32;
        side.div_ceil(32).max(1).saturating_mul(32).min(cap)
    };
    let target_width = fit(width);
    let target_height = fit(height);
    let scale = Scale {
        factor_x: width as f32 / target_width as f32,
        factor_y: height as f32 / target_height as f32,
        target_width,
        target_height,
    };
    log::debug!(
        "Detection input for (w: {width}, h: {height}) at x{upscale_ratio}: (w: {target_width}, h: {target_height})"
    );
    scale
}

pub(crate) fn part_image(image: &DynamicImage, b_box: &Polygon<f32>) -> Option<DynamicImage> {
    let rect = b_box.bounding_rect()?;
    let x = (rect.min().x.max(0.0) as u32).min(image.width());
    let y = (rect.min().y.max(0.0) as u32).min(image.height());
    let width = (rect.width().ceil() as u32).min(image.width() - x);
    let height = (rect.height().ceil() as u32).min(image.height() - y);
    if width == 0 || height == 0 {
        return None;
    }
    log::trace!("Slicing subimage to {rect:?}");
    Some(image.crop_imm(x, y, width, height))
}
