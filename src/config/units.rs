//! Unit types for physical quantities.
//!
//! Provides type-safe representations of lengths, speeds, frequencies and
//! step resolutions used by the configuration.

use core::ops::{Add, Sub};

use serde::Deserialize;

use crate::error::ConfigError;

/// Length in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Speed in millimeters per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec(pub f32);

impl MmPerSec {
    /// Create a new MmPerSec value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Frequency in hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(transparent)]
pub struct Hertz(pub u32);

impl Hertz {
    /// Create a new Hertz value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whole microseconds in one period (0 for a zero frequency).
    #[inline]
    pub fn period_us(self) -> u32 {
        if self.0 == 0 {
            0
        } else {
            libm::floorf(1_000_000.0 / self.0 as f32) as u32
        }
    }
}

/// Duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(transparent)]
pub struct Microseconds(pub u32);

impl Microseconds {
    /// Create a new Microseconds value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Signed position in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Steps(pub i32);

impl Steps {
    /// Create a new Steps value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Convert to millimeters.
    #[inline]
    pub fn to_mm(self, steps_per_mm: StepsPerMm) -> Millimeters {
        Millimeters(self.0 as f32 / steps_per_mm.value())
    }

    /// Nearest step position for a length in millimeters.
    #[inline]
    pub fn from_mm(mm: Millimeters, steps_per_mm: StepsPerMm) -> Self {
        Self(libm::roundf(mm.0 * steps_per_mm.value()) as i32)
    }
}

impl Add for Steps {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Steps {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Actuator resolution in steps per millimeter.
///
/// Validated at construction to be finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct StepsPerMm(f32);

impl StepsPerMm {
    /// Create a new StepsPerMm value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStepsPerMm` if the value is not finite and > 0.
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if Self::is_valid(value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidStepsPerMm(value))
        }
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Check if a value is valid.
    #[inline]
    pub fn is_valid(value: f32) -> bool {
        value.is_finite() && value > 0.0
    }
}

impl Default for StepsPerMm {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f32> for StepsPerMm {
    type Error = ConfigError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for StepsPerMm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = f32::deserialize(deserializer)?;
        StepsPerMm::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}
