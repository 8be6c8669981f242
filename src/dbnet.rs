use std::path::Path;

use geo::{Coord, MinimumRotatedRect, Scale};
use image::{imageops::FilterType, DynamicImage, GrayImage};
use imageproc::{
    contours::find_contours,
    contrast::{threshold_mut, ThresholdType},
    distance_transform::Norm,
    morphology::dilate_mut,
};
use ndarray::{ArrayView2, Axis, Ix2};
use ort::{inputs, Session};
use tracing::instrument;

use crate::{
    error::OracleError,
    session::{self, SessionOptions, ShapeProfile},
    util::{
        self, box_score_fast, max_side, subtract_mean_normalize, to_geo_poly, to_luma_image, unclip,
    },
    ExecutionProvider, TextBox,
};

const MEAN_VALUES: [f32; 3] = [0.485, 0.456, 0.406];
const NORM_VALUES: [f32; 3] = [1.0 / 0.229, 1.0 / 0.224, 1.0 / 0.225];

/// Shortest side a box may have before and after unclipping.
const MIN_SIDE: f32 = 3.0;
const MAX_CANDIDATES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxThresholds {
    /// Probability a pixel needs to count as text.
    pub pixel: f32,
    /// Mean probability a box needs to be kept.
    pub score: f32,
    pub unclip_ratio: f32,
}

impl Default for BoxThresholds {
    fn default() -> Self {
        Self {
            pixel: 0.3,
            score: 0.5,
            unclip_ratio: 1.6,
        }
    }
}

/// DBNet text detector.
pub struct DbNet {
    session: Session,
}

impl DbNet {
    #[instrument(level = "debug", skip(providers))]
    pub fn init(
        path: &Path,
        threads: usize,
        max_side_len: u32,
        providers: &[ExecutionProvider],
        cache_path: Option<std::path::PathBuf>,
    ) -> ort::Result<Self> {
        let session = session::load(
            path,
            &SessionOptions {
                threads,
                providers,
                cache_path,
                profile: ShapeProfile {
                    min: "x:1x3x32x32".to_string(),
                    opt: "x:1x3x96x192".to_string(),
                    max: format!("x:1x3x{max_side_len}x{max_side_len}"),
                },
            },
        )?;
        Ok(Self { session })
    }

    /// Text boxes in the coordinates of `image`.
    #[instrument(skip(self, image), level = "debug")]
    pub fn get_text_boxes(
        &self,
        image: &DynamicImage,
        scale: util::Scale,
        thresholds: BoxThresholds,
    ) -> Result<Vec<TextBox>, OracleError> {
        let image =
            image.resize_exact(scale.target_width, scale.target_height, FilterType::Lanczos3);
        let input_values =
            subtract_mean_normalize(&image, &MEAN_VALUES, &NORM_VALUES).insert_axis(Axis(0));
        let outputs = self.session.run(inputs!["x" => input_values]?)?;
        let (_, pred_mat) = outputs
            .first_key_value()
            .ok_or_else(|| OracleError::Decode("detector produced no output".into()))?;
        let pred_mat = pred_mat.try_extract_tensor::<f32>()?;

        // (1, 1, H, W) probability map
        let pred_data = pred_mat
            .index_axis(Axis(0), 0)
            .index_axis_move(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|err| OracleError::Decode(format!("detector output: {err}")))?;

        let mut mask = to_luma_image(pred_data)
            .ok_or_else(|| OracleError::Decode("detector map has no pixels".into()))?;
        threshold_mut(
            &mut mask,
            (thresholds.pixel * 255.0) as u8,
            ThresholdType::Binary,
        );
        dilate_mut(&mut mask, Norm::L1, 2);

        Ok(find_boxes(pred_data, &mask, scale, thresholds))
    }
}

#[instrument(skip(pred_data, mask), level = "trace")]
fn find_boxes(
    pred_data: ArrayView2<f32>,
    mask: &GrayImage,
    util::Scale {
        factor_x, factor_y, ..
    }: util::Scale,
    thresholds: BoxThresholds,
) -> Vec<TextBox> {
    find_contours::<i32>(mask)
        .into_iter()
        .take(MAX_CANDIDATES)
        .filter(|it| it.points.len() > 2)
        .filter_map(|it| to_geo_poly(&it.points).minimum_rotated_rect())
        .filter(|rect| max_side(rect) >= MIN_SIDE)
        .map(|rect| {
            let score = box_score_fast(&rect, pred_data);
            (rect, score)
        })
        .filter(|(_, score)| *score >= thresholds.score)
        .filter_map(|(rect, score)| Some((unclip(rect, thresholds.unclip_ratio)?, score)))
        .filter(|(rect, _)| max_side(rect) >= MIN_SIDE + 2.0)
        .map(|(rect, score)| TextBox {
            score,
            rect: rect.scale_around_point(factor_x, factor_y, Coord::zero()),
        })
        .collect()
}
