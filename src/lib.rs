use std::{
    cmp::Reverse,
    path::PathBuf,
    time::{Duration, Instant},
};

use crnn_net::CrnnNet;
use dbnet::DbNet;
use float_ord::FloatOrd;
use image::{imageops::FilterType, DynamicImage};
use tracing::instrument;

pub mod batch;
pub mod config;
pub mod confidence;
pub mod coords;
mod crnn_net;
pub mod dbnet;
pub mod error;
pub mod extract;
pub mod geotag;
pub mod kml;
pub mod layout;
pub mod mask;
pub mod oracle;
pub mod prune;
pub mod publish;
pub mod report;
mod result;
mod session;
pub mod thumbnail;
pub mod timestamp;
pub mod util;

pub use confidence::{Band, ConfidenceBands};
pub use coords::{Coordinate, Dms, Hemisphere, Precision};
pub use dbnet::BoxThresholds;
pub use error::{Error, OracleError, OracleFault, Result};
pub use extract::{extract, Extraction, ExtractionOutcome, Reading};
pub use layout::{Axis, Rect, Roi, RoiLayout, RoiSpec, RoiTuning};
pub use oracle::{Allowlist, RecognitionRequest, Recognizer};
pub use result::*;
use util::{part_image, scale_for_detection};

pub use ort as runtime;

pub struct OverlayOcrBuilder {
    threads: usize,
    det_path: Option<PathBuf>,
    rec_paths: Option<(PathBuf, PathBuf)>,
    max_side_len: u32,
    thresholds: BoxThresholds,
    roi_budget: Option<Duration>,
    cache_path: Option<PathBuf>,
    execution_providers: Vec<ExecutionProvider>,
}

impl OverlayOcrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn det_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.det_path = Some(path.into());
        self
    }

    pub fn rec_model(
        mut self,
        model_path: impl Into<PathBuf>,
        keys_path: impl Into<PathBuf>,
    ) -> Self {
        self.rec_paths = Some((model_path.into(), keys_path.into()));
        self
    }

    pub fn max_side_len(mut self, max_side_len: u32) -> Self {
        self.max_side_len = max_side_len;
        self
    }

    pub fn box_thresholds(mut self, thresholds: BoxThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Longest time a single region may take before it is reported as a fault.
    ///
    /// The budget is checked after detection and after each recognized line.
    /// A model run that stalls is not interrupted; the timeout surfaces once
    /// it returns.
    pub fn roi_budget(mut self, budget: Option<Duration>) -> Self {
        self.roi_budget = budget;
        self
    }

    pub fn with_engine_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_execution_providers(
        mut self,
        providers: impl IntoIterator<Item = ExecutionProvider>,
    ) -> Self {
        self.execution_providers = providers.into_iter().collect();
        self
    }

    #[instrument(skip(self), level = "debug")]
    fn init_models(&mut self) -> ort::Result<(DbNet, CrnnNet)> {
        let det_path = self
            .det_path
            .take()
            .unwrap_or_else(|| "models/en_PP-OCRv3_det_infer.onnx".into());
        let (rec_path, keys_path) = self.rec_paths.take().unwrap_or_else(|| {
            (
                "models/en_PP-OCRv4_rec_infer.onnx".into(),
                "models/en_dict.txt".into(),
            )
        });
        Ok((
            DbNet::init(
                &det_path,
                self.threads,
                self.max_side_len,
                &self.execution_providers,
                self.cache_path.clone(),
            )?,
            CrnnNet::init(
                &rec_path,
                &keys_path,
                self.threads,
                &self.execution_providers,
                self.cache_path.clone(),
            )?,
        ))
    }

    /// Loads the models. Do this once per run and share the engine.
    #[instrument(skip(self))]
    pub fn build(mut self) -> ort::Result<OverlayOcr> {
        let (det_model, rec_model) = self.init_models()?;
        Ok(OverlayOcr {
            det_model,
            rec_model,
            max_side_len: self.max_side_len,
            thresholds: self.thresholds,
            roi_budget: self.roi_budget,
        })
    }
}

impl Default for OverlayOcrBuilder {
    fn default() -> Self {
        Self {
            threads: 4,
            det_path: None,
            rec_paths: None,
            max_side_len: 1024,
            thresholds: BoxThresholds::default(),
            roi_budget: Some(Duration::from_secs(10)),
            cache_path: None,
            execution_providers: DEFAULT_PROVIDERS.to_vec(),
        }
    }
}

/// ONNX text recognizer for overlay regions: DBNet detection, then CRNN
/// recognition constrained to the request's allowlist.
pub struct OverlayOcr {
    det_model: DbNet,
    rec_model: CrnnNet,
    max_side_len: u32,
    thresholds: BoxThresholds,
    roi_budget: Option<Duration>,
}

impl OverlayOcr {
    fn check_budget(&self, started: Instant) -> Result<(), OracleError> {
        check_budget(self.roi_budget, started.elapsed())
    }
}

/// Fails once `elapsed` is past `budget`.
fn check_budget(budget: Option<Duration>, elapsed: Duration) -> Result<(), OracleError> {
    match budget {
        Some(budget) if elapsed > budget => Err(OracleError::Timeout {
            budget_ms: budget.as_millis(),
        }),
        _ => Ok(()),
    }
}

impl Recognizer for OverlayOcr {
    #[instrument(skip(self, image), level = "debug")]
    fn recognize(
        &self,
        image: &DynamicImage,
        request: &RecognitionRequest,
    ) -> Result<Vec<Candidate>, OracleError> {
        let started = Instant::now();
        let scale = scale_for_detection(
            image.width(),
            image.height(),
            request.upscale_ratio,
            self.max_side_len,
        );
        let boxes = self
            .det_model
            .get_text_boxes(image, scale, self.thresholds)?;
        self.check_budget(started)?;

        // Overlay crops are tight around the glyphs, the detector may see no edges at all.
        let lines = if boxes.is_empty() {
            vec![(crop_bounds(image.width(), image.height()), image.clone())]
        } else {
            boxes
                .into_iter()
                .filter_map(|it| Some((it.rect.clone(), part_image(image, &it.rect)?)))
                .collect::<Vec<_>>()
        };

        let mut candidates = Vec::with_capacity(lines.len());
        for (bounds, line_image) in lines {
            let line_image = if request.upscale_ratio > 1.0 {
                let width = (line_image.width() as f32 * request.upscale_ratio) as u32;
                let height = (line_image.height() as f32 * request.upscale_ratio) as u32;
                line_image.resize_exact(width, height, FilterType::Lanczos3)
            } else {
                line_image
            };
            let line = self.rec_model.get_text_line(&line_image, request.allowlist)?;
            self.check_budget(started)?;
            let confidence = line.confidence();
            if line.text.is_empty() || confidence < request.confidence_floor {
                log::trace!("Dropping {:?} at {confidence}", line.text);
                continue;
            }
            candidates.push(Candidate {
                bounds,
                text: line.text,
                confidence,
            });
        }
        candidates.sort_by_key(|it| Reverse(FloatOrd(it.confidence)));
        Ok(candidates)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Default,
    #[cfg(feature = "tensorrt")]
    TensorRT,
    #[cfg(feature = "coreml")]
    CoreML,
    #[cfg(feature = "cuda")]
    Cuda,
    #[cfg(feature = "directml")]
    DirectML,
}

const DEFAULT_PROVIDERS: &[ExecutionProvider] = &[
    #[cfg(feature = "tensorrt")]
    ExecutionProvider::TensorRT,
    #[cfg(feature = "coreml")]
    ExecutionProvider::CoreML,
    #[cfg(feature = "directml")]
    ExecutionProvider::DirectML,
    #[cfg(feature = "cuda")]
    ExecutionProvider::Cuda,
    ExecutionProvider::Default,
];
