use image::DynamicImage;

use crate::{error::OracleError, layout::RoiTuning, Candidate};

/// Characters a region is allowed to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowlist(&'static str);

impl Allowlist {
    pub const DIGITS: Allowlist = Allowlist("0123456789");
    pub const NORTH_SOUTH: Allowlist = Allowlist("NS");
    pub const EAST_WEST: Allowlist = Allowlist("EW");

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn contains(&self, c: char) -> bool {
        self.0.contains(c)
    }

    pub fn admits(&self, text: &str) -> bool {
        text.chars().all(|c| self.contains(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionRequest {
    pub allowlist: Allowlist,
    pub upscale_ratio: f32,
    pub confidence_floor: f32,
}

impl RecognitionRequest {
    pub fn new(allowlist: Allowlist, tuning: RoiTuning) -> Self {
        Self {
            allowlist,
            upscale_ratio: tuning.upscale_ratio,
            confidence_floor: tuning.confidence_floor,
        }
    }
}

/// Text recognizer used by the extractor.
///
/// Implementations return candidates best-first. An empty vector means no text
/// cleared the confidence floor; an `Err` means the recognizer itself failed.
/// The recognizer is built once per run and shared read-only across frames.
pub trait Recognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        request: &RecognitionRequest,
    ) -> Result<Vec<Candidate>, OracleError>;
}

impl<R: Recognizer + ?Sized> Recognizer for &R {
    fn recognize(
        &self,
        image: &DynamicImage,
        request: &RecognitionRequest,
    ) -> Result<Vec<Candidate>, OracleError> {
        (**self).recognize(image, request)
    }
}

impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    fn recognize(
        &self,
        image: &DynamicImage,
        request: &RecognitionRequest,
    ) -> Result<Vec<Candidate>, OracleError> {
        (**self).recognize(image, request)
    }
}
