use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    N,
    S,
    E,
    W,
}

impl Hemisphere {
    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::N | Hemisphere::E => 1.0,
            Hemisphere::S | Hemisphere::W => -1.0,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Hemisphere::N | Hemisphere::S => Axis::Latitude,
            Hemisphere::E | Hemisphere::W => Axis::Longitude,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Hemisphere::N),
            'S' => Some(Hemisphere::S),
            'E' => Some(Hemisphere::E),
            'W' => Some(Hemisphere::W),
            _ => None,
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Hemisphere::N => "N",
            Hemisphere::S => "S",
            Hemisphere::E => "E",
            Hemisphere::W => "W",
        };
        f.write_str(c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("{field} text {text:?} is not a number")]
    NotANumber { field: &'static str, text: String },
    #[error("hemisphere text {text:?} is not valid for {axis:?}")]
    Hemisphere { text: String, axis: Axis },
}

/// Coordinate as read off the overlay, one text per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub axis: Axis,
    pub degrees: String,
    pub minutes: String,
    pub seconds: String,
    pub hemisphere: String,
}

impl Coordinate {
    pub fn to_dms(&self) -> Result<Dms, CoordinateError> {
        let number = |field: &'static str, text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| CoordinateError::NotANumber {
                    field,
                    text: text.to_string(),
                })
        };
        let hemisphere = self
            .hemisphere
            .trim()
            .chars()
            .next()
            .and_then(Hemisphere::from_char)
            .filter(|h| h.axis() == self.axis)
            .ok_or_else(|| CoordinateError::Hemisphere {
                text: self.hemisphere.clone(),
                axis: self.axis,
            })?;
        Ok(Dms {
            degrees: number("degrees", &self.degrees)?,
            minutes: number("minutes", &self.minutes)?,
            seconds: number("seconds", &self.seconds)?,
            hemisphere,
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : {}{}",
            self.degrees, self.minutes, self.seconds, self.hemisphere
        )
    }
}

/// Rounding policy for decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Keep every bit, used for per-image metadata.
    Full,
    /// Round to this many fractional digits, used for map reports.
    Rounded(u32),
}

impl Precision {
    pub const REPORT: Precision = Precision::Rounded(6);

    pub fn apply(self, value: f64) -> f64 {
        match self {
            Precision::Full => value,
            Precision::Rounded(digits) => {
                let factor = 10f64.powi(digits as i32);
                (value * factor).round() / factor
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dms {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub hemisphere: Hemisphere,
}

impl Dms {
    pub fn new(degrees: f64, minutes: f64, seconds: f64, hemisphere: Hemisphere) -> Self {
        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }

    pub fn to_decimal(&self, precision: Precision) -> f64 {
        let magnitude = self.degrees + self.minutes / 60.0 + self.seconds / 3600.0;
        precision.apply(self.hemisphere.sign() * magnitude)
    }
}
