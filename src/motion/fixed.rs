//! 2.62 fixed point for the real-time step path.
//!
//! Per-tick step quantities are tiny (a 100 kHz ticker stepping at 10 kHz
//! advances 0.1 steps per tick and changes that rate by ~1e-6 per tick), so
//! they are held as signed 64-bit integers scaled by 2^62. Conversions from
//! floating point are only done on the producer side when a block is prepared;
//! the step ticker itself only adds, subtracts and compares.

use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Signed 2.62 fixed point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FixedPoint(i64);

impl FixedPoint {
    /// Number of fractional bits.
    pub const FRACTIONAL_BITS: u32 = 62;

    /// Raw value of 1.0.
    pub const SCALE: i64 = 1 << Self::FRACTIONAL_BITS;

    /// 0.0
    pub const ZERO: Self = Self(0);

    /// 1.0 (one whole step).
    pub const ONE: Self = Self(Self::SCALE);

    /// Wrap a raw 2.62 value.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw 2.62 value.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Convert from a double, rounding to the nearest representable value.
    ///
    /// Values outside the 2.62 range saturate.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self(libm::round(value * Self::SCALE as f64) as i64)
    }

    /// Round an already scaled double (value × 2^62) to fixed point.
    #[inline]
    pub fn from_scaled_f64(scaled: f64) -> Self {
        Self(libm::round(scaled) as i64)
    }

    /// Convert to single precision.
    #[inline]
    pub fn to_f32(self) -> f32 {
        (self.0 as f64 / Self::SCALE as f64) as f32
    }

    /// Convert to double precision.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// `true` if the value is zero or negative.
    #[inline]
    pub const fn is_non_positive(self) -> bool {
        self.0 <= 0
    }
}

impl Add for FixedPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for FixedPoint {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for FixedPoint {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for FixedPoint {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}
