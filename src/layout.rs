use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::oracle::Allowlist;

/// Resolution of the camera overlay the default layout was measured on.
pub const FRAME_WIDTH: u32 = 1920;
pub const FRAME_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Roi {
    LatDd,
    LatMm,
    LatSs,
    LatDir,
    LonDd,
    LonMm,
    LonSs,
    LonDir,
}

impl Roi {
    pub const ALL: [Roi; 8] = [
        Roi::LatDd,
        Roi::LatMm,
        Roi::LatSs,
        Roi::LatDir,
        Roi::LonDd,
        Roi::LonMm,
        Roi::LonSs,
        Roi::LonDir,
    ];

    /// Name used in logs and in the not-processed report.
    pub fn name(self) -> &'static str {
        match self {
            Roi::LatDd => "lat_dd_text",
            Roi::LatMm => "lat_mm_text",
            Roi::LatSs => "lat_ss_text",
            Roi::LatDir => "lat_dir_text",
            Roi::LonDd => "lon_dd_text",
            Roi::LonMm => "lon_mm_text",
            Roi::LonSs => "lon_ss_text",
            Roi::LonDir => "lon_dir_text",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn axis(self) -> Axis {
        if self.index() < 4 {
            Axis::Latitude
        } else {
            Axis::Longitude
        }
    }

    pub fn field(self) -> Field {
        match self.index() % 4 {
            0 => Field::Degrees,
            1 => Field::Minutes,
            2 => Field::Seconds,
            _ => Field::Hemisphere,
        }
    }

    pub fn allowlist(self) -> Allowlist {
        match (self.axis(), self.field()) {
            (_, Field::Degrees | Field::Minutes | Field::Seconds) => Allowlist::DIGITS,
            (Axis::Latitude, Field::Hemisphere) => Allowlist::NORTH_SOUTH,
            (Axis::Longitude, Field::Hemisphere) => Allowlist::EAST_WEST,
        }
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn rois(self) -> [Roi; 4] {
        match self {
            Axis::Latitude => [Roi::LatDd, Roi::LatMm, Roi::LatSs, Roi::LatDir],
            Axis::Longitude => [Roi::LonDd, Roi::LonMm, Roi::LonSs, Roi::LonDir],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Degrees,
    Minutes,
    Seconds,
    Hemisphere,
}

/// Pixel rectangle, `x2` and `y2` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2 && self.x2 <= width && self.y2 <= height
    }

    pub fn crop(&self, image: &DynamicImage) -> DynamicImage {
        let x = self.x1.min(image.width());
        let y = self.y1.min(image.height());
        let width = self.width().min(image.width() - x);
        let height = self.height().min(image.height() - y);
        image.crop_imm(x, y, width, height)
    }
}

/// Knobs handed to the recognizer for one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiTuning {
    pub upscale_ratio: f32,
    pub confidence_floor: f32,
}

impl Default for RoiTuning {
    fn default() -> Self {
        Self {
            upscale_ratio: 3.0,
            confidence_floor: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiSpec {
    pub rect: Rect,
    pub tuning: RoiTuning,
}

/// The eight overlay regions of one camera model.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiLayout {
    pub frame_width: u32,
    pub frame_height: u32,
    regions: [RoiSpec; 8],
}

impl RoiLayout {
    pub fn get(&self, roi: Roi) -> &RoiSpec {
        &self.regions[roi.index()]
    }

    pub fn get_mut(&mut self, roi: Roi) -> &mut RoiSpec {
        &mut self.regions[roi.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Roi, &RoiSpec)> {
        Roi::ALL.into_iter().zip(self.regions.iter())
    }

    /// Regions that do not lie fully inside the frame.
    pub fn out_of_bounds(&self) -> Vec<Roi> {
        self.iter()
            .filter(|(_, spec)| !spec.rect.fits_within(self.frame_width, self.frame_height))
            .map(|(roi, _)| roi)
            .collect()
    }
}

impl Default for RoiLayout {
    fn default() -> Self {
        let tuned = |rect| RoiSpec {
            rect,
            tuning: RoiTuning::default(),
        };
        Self {
            frame_width: FRAME_WIDTH,
            frame_height: FRAME_HEIGHT,
            regions: [
                tuned(Rect::new(1670, 988, 1725, 1017)),
                tuned(Rect::new(1744, 988, 1799, 1017)),
                tuned(Rect::new(1820, 988, 1867, 1017)),
                tuned(Rect::new(1866, 988, 1891, 1017)),
                // The longitude degrees glyphs sit taller and read better with less magnification.
                RoiSpec {
                    rect: Rect::new(1670, 1018, 1730, 1060),
                    tuning: RoiTuning {
                        upscale_ratio: 2.0,
                        confidence_floor: 0.7,
                    },
                },
                tuned(Rect::new(1744, 1018, 1799, 1049)),
                tuned(Rect::new(1820, 1018, 1867, 1049)),
                tuned(Rect::new(1866, 1018, 1891, 1049)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_fits_the_overlay_frame() {
        assert!(RoiLayout::default().out_of_bounds().is_empty());
    }

    #[test]
    fn hemisphere_fields_get_two_letter_allowlists() {
        assert_eq!(Roi::LatDir.allowlist(), Allowlist::NORTH_SOUTH);
        assert_eq!(Roi::LonDir.allowlist(), Allowlist::EAST_WEST);
        assert_eq!(Roi::LonSs.allowlist(), Allowlist::DIGITS);
    }

    #[test]
    fn roi_groups_follow_axis() {
        for axis in [Axis::Latitude, Axis::Longitude] {
            assert!(axis.rois().iter().all(|roi| roi.axis() == axis));
        }
        assert_eq!(Roi::LonMm.field(), Field::Minutes);
    }
}
