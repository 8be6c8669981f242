use float_ord::FloatOrd;
use image::{DynamicImage, GenericImageView};
use tracing::instrument;

use crate::{
    confidence::{Band, ConfidenceBands},
    coords::Coordinate,
    error::OracleFault,
    layout::{Axis, Roi, RoiLayout},
    oracle::{RecognitionRequest, Recognizer},
};

/// Top candidate kept for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub text: String,
    pub confidence: f32,
}

/// Per-region readings of one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    readings: [Option<Reading>; 8],
}

impl Extraction {
    pub fn from_readings(readings: [Option<Reading>; 8]) -> Self {
        Self { readings }
    }

    pub fn reading(&self, roi: Roi) -> Option<&Reading> {
        self.readings[roi.index()].as_ref()
    }

    /// Assembles one axis, only when all four of its regions were read.
    pub fn coordinate(&self, axis: Axis) -> Option<Coordinate> {
        let [degrees, minutes, seconds, hemisphere] =
            axis.rois().map(|roi| self.reading(roi).map(|it| it.text.clone()));
        Some(Coordinate {
            axis,
            degrees: degrees?,
            minutes: minutes?,
            seconds: seconds?,
            hemisphere: hemisphere?,
        })
    }

    pub fn latitude(&self) -> Option<Coordinate> {
        self.coordinate(Axis::Latitude)
    }

    pub fn longitude(&self) -> Option<Coordinate> {
        self.coordinate(Axis::Longitude)
    }

    /// Regions without a candidate, in layout order.
    pub fn missing(&self) -> Vec<Roi> {
        Roi::ALL
            .into_iter()
            .filter(|roi| self.reading(*roi).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.readings.iter().all(Option::is_some)
    }

    /// Lowest confidence among the regions that were read.
    ///
    /// Empty regions are skipped rather than counted as zero; `None` when
    /// nothing was read at all. Ties resolve to the earliest region.
    pub fn weakest_link(&self) -> Option<(Roi, f32)> {
        Roi::ALL
            .into_iter()
            .filter_map(|roi| self.reading(roi).map(|it| (roi, it.confidence)))
            .min_by_key(|(_, confidence)| FloatOrd(*confidence))
    }

    pub fn band(&self, bands: &ConfidenceBands) -> Option<Band> {
        self.weakest_link()
            .map(|(_, confidence)| bands.classify(confidence))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// The frame is not the overlay resolution; nothing was recognized.
    DimensionMismatch { width: u32, height: u32 },
    Recognized(Extraction),
}

impl ExtractionOutcome {
    pub fn extraction(&self) -> Option<&Extraction> {
        match self {
            ExtractionOutcome::Recognized(extraction) => Some(extraction),
            ExtractionOutcome::DimensionMismatch { .. } => None,
        }
    }
}

/// Reads the burned-in coordinate overlay of a frame.
///
/// Every region is cropped from the fixed `layout` and passed to `oracle`
/// with its allowlist and tuning; the top candidate per region is kept.
/// A wrong-sized frame and unreadable regions are ordinary outcomes. Only a
/// failing oracle produces an `Err`.
#[instrument(skip_all, level = "debug")]
pub fn extract<R: Recognizer + ?Sized>(
    frame: &DynamicImage,
    layout: &RoiLayout,
    oracle: &R,
) -> Result<ExtractionOutcome, OracleFault> {
    let (width, height) = frame.dimensions();
    if width != layout.frame_width || height != layout.frame_height {
        return Ok(ExtractionOutcome::DimensionMismatch { width, height });
    }

    let mut readings: [Option<Reading>; 8] = Default::default();
    for (roi, spec) in layout.iter() {
        let crop = spec.rect.crop(frame);
        #[cfg(feature = "debug")]
        if let Err(err) = crop.save(format!("part_images/{roi}.png")) {
            log::warn!("Could not save crop for {roi}: {err}");
        }
        let request = RecognitionRequest::new(roi.allowlist(), spec.tuning);
        let candidates = oracle
            .recognize(&crop, &request)
            .map_err(|source| OracleFault { roi, source })?;
        // Only the top candidate counts; a blank one leaves the region unread.
        readings[roi.index()] = candidates
            .into_iter()
            .next()
            .filter(|candidate| !candidate.text.trim().is_empty())
            .map(|candidate| Reading {
                text: candidate.text.trim().to_string(),
                confidence: candidate.confidence,
            });
        if let Some(reading) = &readings[roi.index()] {
            if !request.allowlist.admits(&reading.text) {
                log::warn!(
                    "{roi}: {:?} has characters outside {:?}",
                    reading.text,
                    request.allowlist.as_str()
                );
            }
        }
        log::trace!("{roi}: {:?}", readings[roi.index()]);
    }

    Ok(ExtractionOutcome::Recognized(Extraction { readings }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(text: &str, confidence: f32) -> Option<Reading> {
        Some(Reading {
            text: text.into(),
            confidence,
        })
    }

    #[test]
    fn weakest_link_skips_empty_regions() {
        let extraction = Extraction::from_readings([
            reading("46", 0.95),
            reading("30", 0.50),
            reading("36", 0.92),
            reading("N", 0.91),
            None,
            None,
            None,
            None,
        ]);
        assert_eq!(extraction.weakest_link(), Some((Roi::LatMm, 0.50)));
        assert_eq!(
            extraction.band(&ConfidenceBands::default()),
            Some(Band::Medium)
        );
        assert!(extraction.latitude().is_some());
        assert!(extraction.longitude().is_none());
        assert_eq!(
            extraction.missing(),
            vec![Roi::LonDd, Roi::LonMm, Roi::LonSs, Roi::LonDir]
        );
    }

    #[test]
    fn nothing_read_has_no_weakest_link() {
        let extraction = Extraction::default();
        assert_eq!(extraction.weakest_link(), None);
        assert_eq!(extraction.missing(), Roi::ALL.to_vec());
        assert!(!extraction.is_complete());
    }

    #[test]
    fn ties_resolve_to_the_first_region() {
        let mut readings: [Option<Reading>; 8] = Default::default();
        readings[Roi::LatSs.index()] = reading("1", 0.4);
        readings[Roi::LonSs.index()] = reading("2", 0.4);
        let extraction = Extraction::from_readings(readings);
        assert_eq!(extraction.weakest_link(), Some((Roi::LatSs, 0.4)));
    }
}
