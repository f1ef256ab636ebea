//! Choropleth color scale.
//!
//! Maps a per-feature quality value to a fill. Values above zero fall through
//! an ordered list of [`ColorStop`]s (highest threshold first); exact zero gets
//! a dedicated "no signal" color and the no-data sentinel gets a pattern fill.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_NO_DATA_SENTINEL: f64 = -77.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Result<Self, ColorScaleError> {
        let digits = text.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorScaleError::InvalidColor(text.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorScaleError::InvalidColor(text.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorScaleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Diagonal hatch used for features without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFill {
    pub foreground: Rgb,
    pub background: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Solid(Rgb),
    Pattern(PatternFill),
}

impl Fill {
    pub fn is_pattern(&self) -> bool {
        matches!(self, Fill::Pattern(_))
    }
}

/// A feature's quality value after the sentinel has been recognised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityValue {
    Value(f64),
    NoData,
}

impl fmt::Display for QualityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityValue::Value(value) => write!(f, "{value}"),
            QualityValue::NoData => f.write_str("no data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub threshold: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColorScaleError {
    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("threshold {0} is not a finite, non-negative number")]
    InvalidThreshold(f64),
    #[error("thresholds must be strictly decreasing: {previous} is followed by {next}")]
    NotDecreasing { previous: f64, next: f64 },
    #[error("no-data sentinel {0} must be finite and non-zero")]
    InvalidSentinel(f64),
    #[error("zero color {0} must differ from every ramp color and the no-data pattern")]
    ZeroColorNotDistinct(Rgb),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    sentinel: f64,
    stops: Vec<ColorStop>,
    floor: Rgb,
    zero: Rgb,
    no_data: PatternFill,
}

impl ColorScale {
    pub fn new(
        sentinel: f64,
        stops: Vec<ColorStop>,
        floor: Rgb,
        zero: Rgb,
        no_data: PatternFill,
    ) -> Result<Self, ColorScaleError> {
        if !sentinel.is_finite() || sentinel == 0.0 {
            return Err(ColorScaleError::InvalidSentinel(sentinel));
        }
        for stop in &stops {
            if !stop.threshold.is_finite() || stop.threshold < 0.0 {
                return Err(ColorScaleError::InvalidThreshold(stop.threshold));
            }
        }
        for pair in stops.windows(2) {
            if pair[1].threshold >= pair[0].threshold {
                return Err(ColorScaleError::NotDecreasing {
                    previous: pair[0].threshold,
                    next: pair[1].threshold,
                });
            }
        }
        let scale = Self {
            sentinel,
            stops,
            floor,
            zero,
            no_data,
        };
        if scale.ramp_rank(zero).is_some()
            || zero == no_data.foreground
            || zero == no_data.background
        {
            return Err(ColorScaleError::ZeroColorNotDistinct(zero));
        }
        Ok(scale)
    }

    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn floor_color(&self) -> Rgb {
        self.floor
    }

    pub fn zero_color(&self) -> Rgb {
        self.zero
    }

    pub fn no_data_pattern(&self) -> PatternFill {
        self.no_data
    }

    /// Recognise the sentinel in a raw property value.
    pub fn classify(&self, raw: f64) -> QualityValue {
        if raw == self.sentinel {
            QualityValue::NoData
        } else {
            QualityValue::Value(raw)
        }
    }

    pub fn fill_for_raw(&self, raw: f64) -> Fill {
        self.fill_for(self.classify(raw))
    }

    /// Negative values other than the sentinel, and NaN, have no meaning as a
    /// quality value and render like missing data.
    pub fn fill_for(&self, value: QualityValue) -> Fill {
        let value = match value {
            QualityValue::NoData => return Fill::Pattern(self.no_data),
            QualityValue::Value(value) => value,
        };
        if value.is_nan() || value < 0.0 {
            return Fill::Pattern(self.no_data);
        }
        if value == 0.0 {
            return Fill::Solid(self.zero);
        }
        let color = self
            .stops
            .iter()
            .find(|stop| value > stop.threshold)
            .map(|stop| stop.color)
            .unwrap_or(self.floor);
        Fill::Solid(color)
    }

    /// Position of `color` on the ramp, 0 being the floor color and the
    /// highest threshold ranking last.
    pub fn ramp_rank(&self, color: Rgb) -> Option<usize> {
        self.ramp().position(|candidate| candidate == color)
    }

    /// Ramp colors from lowest to highest intensity.
    pub fn ramp(&self) -> impl Iterator<Item = Rgb> + '_ {
        std::iter::once(self.floor).chain(self.stops.iter().rev().map(|stop| stop.color))
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_NO_DATA_SENTINEL,
            stops: vec![
                ColorStop {
                    threshold: 0.9,
                    color: Rgb::new(0x00, 0x6d, 0x2c),
                },
                ColorStop {
                    threshold: 0.8,
                    color: Rgb::new(0x31, 0xa3, 0x54),
                },
                ColorStop {
                    threshold: 0.6,
                    color: Rgb::new(0x74, 0xc4, 0x76),
                },
                ColorStop {
                    threshold: 0.4,
                    color: Rgb::new(0xa1, 0xd9, 0x9b),
                },
                ColorStop {
                    threshold: 0.2,
                    color: Rgb::new(0xc7, 0xe9, 0xc0),
                },
            ],
            floor: Rgb::new(0xed, 0xf8, 0xe9),
            zero: Rgb::new(0xbd, 0xbd, 0xbd),
            no_data: PatternFill {
                foreground: Rgb::new(0x63, 0x63, 0x63),
                background: Rgb::new(0xf0, 0xf0, 0xf0),
            },
        }
    }
}
