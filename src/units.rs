//! Fixed-point lengths.
//!
//! Every layout quantity is an integer count of English Metric Units so that
//! accumulating thousands of line heights never drifts the way `f32` points do.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

pub const EMU_PER_INCH: i64 = 914_400;
pub const EMU_PER_PT: i64 = 12_700;
pub const EMU_PER_CM: i64 = 360_000;
pub const EMU_PER_MM: i64 = 36_000;
pub const EMU_PER_TWIP: i64 = 635;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Length(i64);

impl Length {
    pub const ZERO: Length = Length(0);

    pub const fn emu(v: i64) -> Self {
        Length(v)
    }

    pub fn pt(v: f64) -> Self {
        Length((v * EMU_PER_PT as f64).round() as i64)
    }

    pub fn mm(v: f64) -> Self {
        Length((v * EMU_PER_MM as f64).round() as i64)
    }

    pub fn cm(v: f64) -> Self {
        Length((v * EMU_PER_CM as f64).round() as i64)
    }

    pub fn inches(v: f64) -> Self {
        Length((v * EMU_PER_INCH as f64).round() as i64)
    }

    pub const fn twips(v: i64) -> Self {
        Length(v * EMU_PER_TWIP)
    }

    pub const fn as_emu(self) -> i64 {
        self.0
    }

    pub fn as_pt(self) -> f64 {
        self.0 as f64 / EMU_PER_PT as f64
    }

    /// Rounded to whole twips, the unit of most WordprocessingML attributes.
    pub fn as_twips(self) -> i64 {
        (self.0 as f64 / EMU_PER_TWIP as f64).round() as i64
    }

    /// Half-points, the unit of `w:sz`.
    pub fn as_half_points(self) -> i64 {
        (self.0 as f64 * 2.0 / EMU_PER_PT as f64).round() as i64
    }

    pub fn scale(self, factor: f64) -> Self {
        Length((self.0 as f64 * factor).round() as i64)
    }

    pub fn clamp_min_zero(self) -> Self {
        Length(self.0.max(0))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Length {
    type Output = Length;
    fn add(self, rhs: Length) -> Length {
        Length(self.0 + rhs.0)
    }
}

impl Sub for Length {
    type Output = Length;
    fn sub(self, rhs: Length) -> Length {
        Length(self.0 - rhs.0)
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Length {
    fn sub_assign(&mut self, rhs: Length) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Length {
    type Output = Length;
    fn mul(self, rhs: i64) -> Length {
        Length(self.0 * rhs)
    }
}

impl Neg for Length {
    type Output = Length;
    fn neg(self) -> Length {
        Length(-self.0)
    }
}

impl Sum for Length {
    fn sum<I: Iterator<Item = Length>>(iter: I) -> Length {
        iter.fold(Length::ZERO, |a, b| a + b)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}pt", self.as_pt())
    }
}
