use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    confidence::ConfidenceBands,
    error::{Error, Result},
    layout::{Rect, Roi, RoiLayout},
    BoxThresholds, OverlayOcr, OverlayOcrBuilder,
};

pub const DEFAULT_CONFIG_NAME: &str = "overlay-geotag.toml";
pub const DEFAULT_REPORT_NAME: &str = "not_processed.txt";
pub const DEFAULT_KML_NAME: &str = "pug_preview.kml";
/// Mask picked up from the working directory when none is configured.
pub const DEFAULT_MASK_NAME: &str = "pgu_mask.png";

/// What to do when the recognizer itself fails on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Stop the run and return the error.
    Halt,
    /// Record the frame in the report and continue.
    #[default]
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub det_model: PathBuf,
    pub rec_model: PathBuf,
    pub rec_keys: PathBuf,
    pub threads: usize,
    pub roi_budget: Option<Duration>,
    pub cache_path: Option<PathBuf>,
    pub thresholds: BoxThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let models = PathBuf::from("models");
        Self {
            det_model: models.join("en_PP-OCRv3_det_infer.onnx"),
            rec_model: models.join("en_PP-OCRv4_rec_infer.onnx"),
            rec_keys: models.join("en_dict.txt"),
            threads: 4,
            roi_budget: Some(Duration::from_secs(10)),
            cache_path: None,
            thresholds: BoxThresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn build(&self) -> Result<OverlayOcr> {
        let mut builder = OverlayOcrBuilder::new()
            .det_model(&self.det_model)
            .rec_model(&self.rec_model, &self.rec_keys)
            .threads(self.threads)
            .box_thresholds(self.thresholds)
            .roi_budget(self.roi_budget);
        if let Some(cache) = &self.cache_path {
            builder = builder.with_engine_cache_path(cache);
        }
        Ok(builder.build()?)
    }
}

/// Everything a geotag run needs, passed explicitly to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub report_path: PathBuf,
    /// Overlay blended onto every output JPEG.
    pub mask_path: Option<PathBuf>,
    pub kml_name: String,
    pub layout: RoiLayout,
    pub bands: ConfidenceBands,
    pub fault_policy: FaultPolicy,
    pub engine: EngineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("out"),
            report_path: PathBuf::from(DEFAULT_REPORT_NAME),
            mask_path: None,
            kml_name: DEFAULT_KML_NAME.to_string(),
            layout: RoiLayout::default(),
            bands: ConfidenceBands::default(),
            fault_policy: FaultPolicy::default(),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    input_root: Option<PathBuf>,
    output_root: Option<PathBuf>,
    report_path: Option<PathBuf>,
    mask_path: Option<PathBuf>,
    kml_name: Option<String>,
    fault_policy: Option<FaultPolicy>,
    bands: Option<ConfidenceBands>,
    #[serde(default)]
    regions: BTreeMap<Roi, RegionSection>,
    engine: Option<EngineSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RegionSection {
    rect: Option<Rect>,
    upscale_ratio: Option<f32>,
    confidence_floor: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    det_model: Option<PathBuf>,
    rec_model: Option<PathBuf>,
    rec_keys: Option<PathBuf>,
    threads: Option<usize>,
    /// Zero disables the budget.
    roi_budget_ms: Option<u64>,
    cache_path: Option<PathBuf>,
    box_threshold: Option<f32>,
    box_score_threshold: Option<f32>,
    unclip_ratio: Option<f32>,
}

impl RunConfig {
    /// Defaults overlaid with the TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_toml(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, or `overlay-geotag.toml` in the working directory if it
    /// exists, or falls back to defaults. Without a configured mask,
    /// `pgu_mask.png` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_NAME).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_NAME))?
            }
            None => Self::default(),
        };
        config.use_default_mask(Path::new("."));
        Ok(config)
    }

    /// Picks up `dir/pgu_mask.png` when no mask is configured.
    pub fn use_default_mask(&mut self, dir: &Path) {
        if self.mask_path.is_some() {
            return;
        }
        let candidate = dir.join(DEFAULT_MASK_NAME);
        if candidate.is_file() {
            tracing::info!("Using mask {}", candidate.display());
            self.mask_path = Some(candidate);
        }
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: RunConfigFile = toml::from_str(raw)?;
        let mut config = Self::default();

        if let Some(v) = file.input_root {
            config.input_root = v;
        }
        if let Some(v) = file.output_root {
            config.output_root = v;
        }
        if let Some(v) = file.report_path {
            config.report_path = v;
        }
        config.mask_path = file.mask_path;
        if let Some(v) = file.kml_name {
            config.kml_name = v;
        }
        if let Some(v) = file.fault_policy {
            config.fault_policy = v;
        }
        if let Some(v) = file.bands {
            config.bands = v;
        }
        for (roi, region) in file.regions {
            let spec = config.layout.get_mut(roi);
            if let Some(rect) = region.rect {
                spec.rect = rect;
            }
            if let Some(v) = region.upscale_ratio {
                spec.tuning.upscale_ratio = v;
            }
            if let Some(v) = region.confidence_floor {
                spec.tuning.confidence_floor = v;
            }
        }
        if let Some(engine) = file.engine {
            let target = &mut config.engine;
            if let Some(v) = engine.det_model {
                target.det_model = v;
            }
            if let Some(v) = engine.rec_model {
                target.rec_model = v;
            }
            if let Some(v) = engine.rec_keys {
                target.rec_keys = v;
            }
            if let Some(v) = engine.threads {
                target.threads = v;
            }
            if let Some(ms) = engine.roi_budget_ms {
                target.roi_budget = (ms > 0).then(|| Duration::from_millis(ms));
            }
            if engine.cache_path.is_some() {
                target.cache_path = engine.cache_path;
            }
            if let Some(v) = engine.box_threshold {
                target.thresholds.pixel = v;
            }
            if let Some(v) = engine.box_score_threshold {
                target.thresholds.score = v;
            }
            if let Some(v) = engine.unclip_ratio {
                target.thresholds.unclip_ratio = v;
            }
        }
        Ok(config)
    }

    /// Checks the configuration before any frame is touched.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join("; ")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.input_root.is_dir() {
            problems.push(format!(
                "input directory {} does not exist",
                self.input_root.display()
            ));
        }
        if self.output_root.exists() && !self.output_root.is_dir() {
            problems.push(format!(
                "output path {} is not a directory",
                self.output_root.display()
            ));
        }
        if let Some(mask) = &self.mask_path {
            if !mask.is_file() {
                problems.push(format!("mask file {} not found", mask.display()));
            }
        }
        let outside = self.layout.out_of_bounds();
        if !outside.is_empty() {
            let names = outside.iter().map(|roi| roi.name()).collect::<Vec<_>>();
            problems.push(format!(
                "regions outside the {}x{} frame: {}",
                self.layout.frame_width,
                self.layout.frame_height,
                names.join(", ")
            ));
        }
        for (roi, spec) in self.layout.iter() {
            if !(spec.tuning.upscale_ratio > 0.0) {
                problems.push(format!("{roi}: upscale_ratio must be positive"));
            }
            if !(0.0..=1.0).contains(&spec.tuning.confidence_floor) {
                problems.push(format!("{roi}: confidence_floor must be within 0..=1"));
            }
        }
        if !self.bands.is_valid() {
            problems.push(format!(
                "confidence bands need 0 <= low < high <= 1, got low {} high {}",
                self.bands.low, self.bands.high
            ));
        }
        if self.kml_name.trim().is_empty() {
            problems.push("kml_name is empty".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(RunConfig::from_toml("").unwrap(), RunConfig::default());
    }

    #[test]
    fn overrides_regions_bands_and_engine() {
        let config = RunConfig::from_toml(
            r#"
            fault_policy = "halt"

            [bands]
            high = 0.8

            [regions.lon_dd]
            rect = { x1 = 1600, y1 = 1000, x2 = 1650, y2 = 1040 }
            confidence_floor = 0.5

            [engine]
            threads = 2
            roi_budget_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.fault_policy, FaultPolicy::Halt);
        assert_eq!(config.bands.high, 0.8);
        assert_eq!(config.bands.low, 0.39);
        let lon_dd = config.layout.get(Roi::LonDd);
        assert_eq!(lon_dd.rect, Rect::new(1600, 1000, 1650, 1040));
        assert_eq!(lon_dd.tuning.confidence_floor, 0.5);
        assert_eq!(lon_dd.tuning.upscale_ratio, 2.0);
        assert_eq!(config.engine.threads, 2);
        assert_eq!(config.engine.roi_budget, None);
    }

    #[test]
    fn default_mask_is_picked_up_only_when_unset() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::default();
        config.use_default_mask(dir.path());
        assert_eq!(config.mask_path, None);

        let mask = dir.path().join(DEFAULT_MASK_NAME);
        std::fs::write(&mask, b"png").unwrap();
        config.use_default_mask(dir.path());
        assert_eq!(config.mask_path, Some(mask));

        let explicit = PathBuf::from("other.png");
        config.mask_path = Some(explicit.clone());
        config.use_default_mask(dir.path());
        assert_eq!(config.mask_path, Some(explicit));
    }

    #[test]
    fn overlay_resolution_is_not_configurable() {
        assert!(RunConfig::from_toml("[frame]\nwidth = 1280\nheight = 720").is_err());
        assert_eq!(RunConfig::default().layout.frame_width, 1920);
        assert_eq!(RunConfig::default().layout.frame_height, 1080);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RunConfig::from_toml("inptu_root = \"x\"").is_err());
        assert!(RunConfig::from_toml("[regions.lat_xx]\nupscale_ratio = 1.0").is_err());
    }

    #[test]
    fn validation_lists_every_problem() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig {
            input_root: dir.path().join("missing"),
            output_root: dir.path().to_path_buf(),
            mask_path: Some(dir.path().join("mask.png")),
            ..RunConfig::default()
        };
        config.layout.get_mut(Roi::LatDir).rect = Rect::new(1900, 1070, 1930, 1090);
        config.bands = ConfidenceBands {
            high: 0.3,
            low: 0.5,
        };

        let Err(Error::Validation(message)) = config.validate() else {
            panic!("expected validation error");
        };
        assert!(message.contains("input directory"));
        assert!(message.contains("mask file"));
        assert!(message.contains("lat_dir_text"));
        assert!(message.contains("confidence bands"));

        config.input_root = dir.path().to_path_buf();
        config.mask_path = None;
        config.layout = RoiLayout::default();
        config.bands = ConfidenceBands::default();
        config.validate().unwrap();
    }
}
