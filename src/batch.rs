use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{info, instrument, warn};

use crate::{
    config::{FaultPolicy, RunConfig},
    confidence::Band,
    coords::{Dms, Precision},
    error::{Error, Result},
    extract::{extract, Extraction, ExtractionOutcome},
    geotag::{write_exif, write_sidecar, GeoTag},
    kml::{self, IconStyle, KmlDocument, Placemark},
    layout::{Axis, Roi},
    mask::apply_mask,
    oracle::Recognizer,
    report::{frame_detail, NotProcessedReport},
    timestamp::capture_time,
    util::files_with_extension,
};

/// Counts of a finished geotag run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    /// Frames with both latitude and longitude.
    pub georeferenced: usize,
    pub dimension_mismatches: usize,
    /// Frames with at least one unreadable region.
    pub incomplete: usize,
    pub oracle_faults: usize,
    pub unreadable: usize,
    /// Frames whose name carries no capture time, so no output was written.
    pub unnamed: usize,
    pub outputs: Vec<PathBuf>,
    pub kml_path: Option<PathBuf>,
    /// Frames in the not-processed report, one line each.
    pub report_entries: usize,
}

struct Run<'a, R: ?Sized> {
    config: &'a RunConfig,
    oracle: &'a R,
    mask: Option<DynamicImage>,
    report: NotProcessedReport,
    kml: KmlDocument,
    summary: RunSummary,
}

/// Geotags every PNG frame of `config.input_root`.
///
/// Every problem of a frame ends up as one line of the not-processed report
/// and the run goes on; only invalid configuration, report or KML I/O
/// failures and, with [`FaultPolicy::Halt`], recognizer faults abort it.
#[instrument(skip_all)]
pub fn run_geotag<R: Recognizer + ?Sized>(config: &RunConfig, oracle: &R) -> Result<RunSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_root)
        .map_err(|err| Error::io(&config.output_root, err))?;
    let mask = config
        .mask_path
        .as_deref()
        .map(|path| image::open(path).map_err(|err| Error::image(path, err)))
        .transpose()?;
    if mask.is_none() {
        info!("No mask configured, output JPEGs are written unmasked");
    }

    let mut run = Run {
        config,
        oracle,
        mask,
        report: NotProcessedReport::create(&config.report_path)?,
        kml: KmlDocument::new(
            "PUG-PREVIEW",
            IconStyle {
                href: kml::CAMERA_ICON.to_string(),
                scale: 0.75,
            },
        ),
        summary: RunSummary::default(),
    };

    let frames = files_with_extension(&config.input_root, &["png"])?;
    let total = frames.len();
    for (i, path) in frames.iter().enumerate() {
        info!("Processing {} : {} of {total}", path.display(), i + 1);
        run.process_frame(path)?;
    }

    let kml_path = config.output_root.join(&config.kml_name);
    run.kml.save(&kml_path)?;
    info!("KML file created at {}", kml_path.display());
    info!(
        "JPEG files with geotag and time: {}",
        config.output_root.display()
    );

    let mut summary = run.summary;
    summary.kml_path = Some(kml_path);
    summary.report_entries = run.report.count();
    if summary.report_entries > 0 {
        warn!(
            "{} frames of {total} could not be fully georeferenced, details in {}",
            summary.report_entries,
            run.report.path().display()
        );
    }
    Ok(summary)
}

/// Problems of one frame, reported together as a single line.
#[derive(Debug, Default)]
struct FrameProblems {
    missing: Vec<Roi>,
    details: Vec<String>,
}

impl<R: Recognizer + ?Sized> Run<'_, R> {
    fn process_frame(&mut self, path: &Path) -> Result<()> {
        self.summary.frames += 1;
        let identifier = path.display().to_string();
        let frame = match image::open(path) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("FAILED ON: {identifier} - could not decode: {err}");
                self.summary.unreadable += 1;
                return self
                    .report
                    .record_failure(&identifier, &format!("Unreadable image: {err}"));
            }
        };

        let mut problems = FrameProblems::default();
        let extraction = match extract(&frame, &self.config.layout, self.oracle) {
            Ok(ExtractionOutcome::Recognized(extraction)) => {
                self.review(&extraction, &mut problems);
                Some(extraction)
            }
            Ok(ExtractionOutcome::DimensionMismatch { width, height }) => {
                info!(
                    "The image {identifier} has dimensions {width}x{height}. Extraction works only for {}x{} imagery.",
                    self.config.layout.frame_width, self.config.layout.frame_height
                );
                self.summary.dimension_mismatches += 1;
                None
            }
            Err(fault) if self.config.fault_policy == FaultPolicy::Halt => {
                return Err(fault.into());
            }
            Err(fault) => {
                self.summary.oracle_faults += 1;
                problems.details.push(format!("Recognizer fault: {fault}"));
                None
            }
        };

        self.write_output(path, &frame, extraction.as_ref(), &mut problems);

        let Some(detail) = frame_detail(&problems.missing, &problems.details) else {
            return Ok(());
        };
        warn!("FAILED ON: {identifier} - {detail}");
        self.report.record_failure(&identifier, &detail)
    }

    /// Logs what was read and notes unreadable regions.
    fn review(&mut self, extraction: &Extraction, problems: &mut FrameProblems) {
        for coordinate in [extraction.latitude(), extraction.longitude()]
            .into_iter()
            .flatten()
        {
            info!("{coordinate}");
        }
        if let Some((roi, confidence)) = extraction.weakest_link() {
            match self.config.bands.classify(confidence) {
                Band::Low => warn!("Lowest confidence score: {confidence:.2} (low) from {roi}"),
                band => info!("Lowest confidence score: {confidence:.2} ({band}) from {roi}"),
            }
        }

        let missing = extraction.missing();
        if !missing.is_empty() {
            self.summary.incomplete += 1;
            problems.missing = missing;
        }
    }

    /// Writes the JPEG, its geotag and placemark. Failures stay with the frame.
    fn write_output(
        &mut self,
        path: &Path,
        frame: &DynamicImage,
        extraction: Option<&Extraction>,
        problems: &mut FrameProblems,
    ) {
        let file_name = path
            .file_name()
            .map(|it| it.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(captured_at) = capture_time(&file_name) else {
            info!("Filename {file_name} does not match expected format.");
            self.summary.unnamed += 1;
            return;
        };

        let jpeg_path = self
            .config
            .output_root
            .join(Path::new(&file_name).with_extension("jpg"));
        let pixels = match &self.mask {
            Some(mask) => match apply_mask(frame, mask) {
                Ok(pixels) => pixels,
                Err(err) => {
                    problems.details.push(err.to_string());
                    return;
                }
            },
            None => frame.to_rgb8(),
        };
        if let Err(err) = pixels.save(&jpeg_path) {
            problems
                .details
                .push(format!("Output error: {}", Error::image(&jpeg_path, err)));
            return;
        }
        self.summary.outputs.push(jpeg_path.clone());

        // Without a readable overlay the JPEG stays unreferenced.
        let Some(extraction) = extraction else {
            return;
        };
        let tag = GeoTag {
            captured_at,
            latitude: parse_axis(extraction, Axis::Latitude, problems),
            longitude: parse_axis(extraction, Axis::Longitude, problems),
        };
        let written = write_exif(&jpeg_path, &tag).and_then(|()| write_sidecar(&jpeg_path, &tag));
        if let Err(err) = written {
            problems.details.push(format!("Geotag error: {err}"));
            return;
        }

        let Some((lon, lat)) = tag.position(Precision::Full) else {
            return;
        };
        self.summary.georeferenced += 1;
        let jpeg = match std::fs::read(&jpeg_path) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                problems
                    .details
                    .push(format!("Preview error: {}", Error::io(&jpeg_path, err)));
                return;
            }
        };
        let preview_name = jpeg_path
            .file_name()
            .map(|it| it.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.kml.push(Placemark {
            description: kml::embedded_preview(
                &preview_name,
                &captured_at.format("%Y:%m:%d %H:%M:%S").to_string(),
                &jpeg,
            ),
            lon,
            lat,
        });
    }
}

fn parse_axis(extraction: &Extraction, axis: Axis, problems: &mut FrameProblems) -> Option<Dms> {
    let coordinate = extraction.coordinate(axis)?;
    match coordinate.to_dms() {
        Ok(dms) => Some(dms),
        Err(err) => {
            problems.details.push(format!("Invalid coordinate: {err}"));
            None
        }
    }
}
