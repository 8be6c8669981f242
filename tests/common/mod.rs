#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::Path,
};

use image::{DynamicImage, GenericImageView, RgbImage};
use overlay_geotag::{
    Candidate, OracleError, RecognitionRequest, Recognizer, Roi, RoiLayout,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub enum Answer {
    Text(&'static str, f32),
    /// Several candidates, best first.
    Ranked(&'static [(&'static str, f32)]),
    Empty,
    Fault,
}

pub type FrameScript = HashMap<Roi, Answer>;

/// Answers from a script keyed by the frame and region painted into the crop
/// by [`overlay_frame`]. Regions without a scripted answer come back empty.
#[derive(Default)]
pub struct ScriptedOracle {
    frames: Vec<FrameScript>,
    calls: Cell<usize>,
    requests: RefCell<Vec<RecognitionRequest>>,
}

impl ScriptedOracle {
    pub fn new(frames: Vec<FrameScript>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn requests(&self) -> Vec<RecognitionRequest> {
        self.requests.borrow().clone()
    }
}

impl Recognizer for ScriptedOracle {
    fn recognize(
        &self,
        image: &DynamicImage,
        request: &RecognitionRequest,
    ) -> Result<Vec<Candidate>, OracleError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        self.requests.borrow_mut().push(*request);

        let [roi_index, frame_index, ..] = image.get_pixel(0, 0).0;
        let roi = Roi::ALL[roi_index as usize];
        let answer = self
            .frames
            .get(frame_index as usize)
            .and_then(|frame| frame.get(&roi))
            .cloned()
            .unwrap_or(Answer::Empty);
        match answer {
            Answer::Text(text, confidence) => Ok(vec![Candidate::whole(
                image.width(),
                image.height(),
                text,
                confidence,
            )]),
            Answer::Ranked(ranked) => Ok(ranked
                .iter()
                .map(|(text, confidence)| {
                    Candidate::whole(image.width(), image.height(), *text, *confidence)
                })
                .collect()),
            Answer::Empty => Ok(Vec::new()),
            Answer::Fault => Err(OracleError::Decode(format!("scripted fault on {roi}"))),
        }
    }
}

/// 46 : 30 : 36N / 7 : 30 : 00E, every region read with confidence 0.95.
pub fn full_overlay() -> FrameScript {
    HashMap::from([
        (Roi::LatDd, Answer::Text("46", 0.95)),
        (Roi::LatMm, Answer::Text("30", 0.95)),
        (Roi::LatSs, Answer::Text("36", 0.95)),
        (Roi::LatDir, Answer::Text("N", 0.95)),
        (Roi::LonDd, Answer::Text("7", 0.95)),
        (Roi::LonMm, Answer::Text("30", 0.95)),
        (Roi::LonSs, Answer::Text("00", 0.95)),
        (Roi::LonDir, Answer::Text("E", 0.95)),
    ])
}

pub fn overlay_without(missing: &[Roi]) -> FrameScript {
    let mut script = full_overlay();
    for roi in missing {
        script.insert(*roi, Answer::Empty);
    }
    script
}

pub fn frame(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120])))
}

/// Overlay-sized frame with every region filled with `[roi index, frame, 0]`.
pub fn overlay_frame(frame_index: u8) -> DynamicImage {
    let layout = RoiLayout::default();
    let mut image = RgbImage::from_pixel(
        layout.frame_width,
        layout.frame_height,
        image::Rgb([40, 80, 120]),
    );
    for (roi, spec) in layout.iter() {
        let rect = spec.rect;
        for y in rect.y1..rect.y2 {
            for x in rect.x1..rect.x2 {
                image.put_pixel(x, y, image::Rgb([roi.index() as u8, frame_index, 0]));
            }
        }
    }
    DynamicImage::ImageRgb8(image)
}

pub fn write_frame(dir: &Path, name: &str, image: &DynamicImage) {
    image
        .save(dir.join(name))
        .expect("Failed to write test frame");
}
