// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed real intervals with outward rounding
//!
//! Every operation returns an interval that contains the image of every real
//! point of its inputs. Arithmetic is rounded with error-free residuals; libm
//! results (which carry no correct-rounding guarantee) are widened by two ulps.

use super::rounding::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Ulps added on each side of a transcendental libm result
const LIBM_ULPS: u32 = 2;

/// Closed interval `[lower, upper]`; the empty interval has `lower > upper`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(lower <= upper, "interval bounds out of order: [{}, {}]", lower, upper);
        Self { lower, upper }
    }

    /// Degenerate interval holding one value
    pub const fn singleton(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub const fn empty() -> Self {
        Self {
            lower: f64::INFINITY,
            upper: f64::NEG_INFINITY,
        }
    }

    /// The whole real line
    pub const fn whole() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// Smallest interval containing both values
    pub fn hull(a: f64, b: f64) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    #[inline]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn is_empty(&self) -> bool {
        !(self.lower <= self.upper)
    }

    pub fn is_singleton(&self) -> bool {
        self.lower == self.upper
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.upper - self.lower
        }
    }

    pub fn median(&self) -> f64 {
        if self.lower.is_infinite() || self.upper.is_infinite() {
            if self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY {
                return 0.0;
            }
            if self.lower.is_infinite() {
                return self.upper;
            }
            return self.lower;
        }
        self.lower + 0.5 * (self.upper - self.lower)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Closest point of the interval to `value`
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        other.is_empty() || (self.lower <= other.lower && other.upper <= self.upper)
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.lower <= other.upper && other.lower <= self.upper
    }

    pub fn intersection(&self, other: &Interval) -> Interval {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if lower <= upper {
            Interval { lower, upper }
        } else {
            Interval::empty()
        }
    }

    /// Smallest interval containing both intervals
    pub fn hull_with(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Split at the median into two halves
    pub fn bisected(&self) -> (Interval, Interval) {
        let mid = self.median();
        (
            Interval {
                lower: self.lower,
                upper: mid,
            },
            Interval {
                lower: mid,
                upper: self.upper,
            },
        )
    }

    pub fn abs(self) -> Interval {
        if self.is_empty() || self.lower >= 0.0 {
            self
        } else if self.upper <= 0.0 {
            -self
        } else {
            Interval {
                lower: 0.0,
                upper: (-self.lower).max(self.upper),
            }
        }
    }

    /// `x * x`, which (unlike `self * self`) never goes negative
    pub fn squared(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        let magnitude = self.abs();
        Interval {
            lower: mul_down(magnitude.lower, magnitude.lower),
            upper: mul_up(magnitude.upper, magnitude.upper),
        }
    }

    pub fn sqrt(self) -> Interval {
        if self.is_empty() || self.upper < 0.0 {
            return Interval::empty();
        }
        Interval {
            lower: sqrt_down(self.lower.max(0.0)),
            upper: sqrt_up(self.upper),
        }
    }

    pub fn sin(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !self.lower.is_finite() || !self.upper.is_finite() || self.width() >= TAU {
            return Interval::new(-1.0, 1.0);
        }
        let at_lower = self.lower.sin();
        let at_upper = self.upper.sin();
        let lower = if contains_periodic_point(self, -FRAC_PI_2, TAU) {
            -1.0
        } else {
            ulps_down(at_lower.min(at_upper), LIBM_ULPS).max(-1.0)
        };
        let upper = if contains_periodic_point(self, FRAC_PI_2, TAU) {
            1.0
        } else {
            ulps_up(at_lower.max(at_upper), LIBM_ULPS).min(1.0)
        };
        Interval { lower, upper }
    }

    pub fn cos(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !self.lower.is_finite() || !self.upper.is_finite() || self.width() >= TAU {
            return Interval::new(-1.0, 1.0);
        }
        let at_lower = self.lower.cos();
        let at_upper = self.upper.cos();
        let lower = if contains_periodic_point(self, PI, TAU) {
            -1.0
        } else {
            ulps_down(at_lower.min(at_upper), LIBM_ULPS).max(-1.0)
        };
        let upper = if contains_periodic_point(self, 0.0, TAU) {
            1.0
        } else {
            ulps_up(at_lower.max(at_upper), LIBM_ULPS).min(1.0)
        };
        Interval { lower, upper }
    }

    /// Tangent; any interval that may reach a pole maps to the whole line
    pub fn tan(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !self.lower.is_finite()
            || !self.upper.is_finite()
            || self.width() >= PI
            || contains_periodic_point(self, FRAC_PI_2, PI)
        {
            return Interval::whole();
        }
        Interval {
            lower: ulps_down(self.lower.tan(), LIBM_ULPS),
            upper: ulps_up(self.upper.tan(), LIBM_ULPS),
        }
    }

    /// Arcsine of the part of the interval inside `[-1, 1]`
    pub fn asin(self) -> Interval {
        let clamped = self.intersection(&Interval::new(-1.0, 1.0));
        if clamped.is_empty() {
            return clamped;
        }
        Interval {
            lower: ulps_down(clamped.lower.asin(), LIBM_ULPS).max(-FRAC_PI_2 - 1e-15),
            upper: ulps_up(clamped.upper.asin(), LIBM_ULPS).min(FRAC_PI_2 + 1e-15),
        }
    }

    /// Arccosine of the part of the interval inside `[-1, 1]` (decreasing)
    pub fn acos(self) -> Interval {
        let clamped = self.intersection(&Interval::new(-1.0, 1.0));
        if clamped.is_empty() {
            return clamped;
        }
        Interval {
            lower: ulps_down(clamped.upper.acos(), LIBM_ULPS).max(0.0),
            upper: ulps_up(clamped.lower.acos(), LIBM_ULPS),
        }
    }

    pub fn exp(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        Interval {
            lower: ulps_down(self.lower.exp(), LIBM_ULPS).max(0.0),
            upper: ulps_up(self.upper.exp(), LIBM_ULPS),
        }
    }

    /// Natural log of the positive part; a lower bound at or below zero maps to -infinity
    pub fn ln(self) -> Interval {
        if self.is_empty() || self.upper <= 0.0 {
            return Interval::empty();
        }
        let lower = if self.lower <= 0.0 {
            f64::NEG_INFINITY
        } else {
            ulps_down(self.lower.ln(), LIBM_ULPS)
        };
        Interval {
            lower,
            upper: ulps_up(self.upper.ln(), LIBM_ULPS),
        }
    }

    /// Integer power
    pub fn powi(self, exponent: i32) -> Interval {
        if self.is_empty() {
            return self;
        }
        if exponent == 0 {
            return Interval::singleton(1.0);
        }
        if exponent < 0 {
            return Interval::singleton(1.0) / self.powi(-exponent);
        }
        let n = exponent as u32;
        if n % 2 == 0 {
            return pow_nonnegative(self.abs(), n);
        }
        if self.lower >= 0.0 {
            pow_nonnegative(self, n)
        } else if self.upper <= 0.0 {
            -pow_nonnegative(-self, n)
        } else {
            let negative = pow_nonnegative(Interval::new(0.0, -self.lower), n);
            let positive = pow_nonnegative(Interval::new(0.0, self.upper), n);
            Interval {
                lower: -negative.upper,
                upper: positive.upper,
            }
        }
    }

    /// Real power `exp(ln(self) * exponent)` over the non-negative part of the base
    pub fn powf(self, exponent: Interval) -> Interval {
        let base = self.intersection(&Interval::new(0.0, f64::INFINITY));
        if base.is_empty() || exponent.is_empty() {
            return Interval::empty();
        }
        if base.upper == 0.0 {
            // 0^e for e > 0
            if exponent.lower > 0.0 {
                return Interval::singleton(0.0);
            }
            return Interval::empty();
        }
        (base.ln() * exponent).exp()
    }
}

/// Repeated squaring over a non-negative interval, where multiplication is monotone
fn pow_nonnegative(base: Interval, mut n: u32) -> Interval {
    let mut result = Interval::singleton(1.0);
    let mut factor = base;
    while n > 0 {
        if n & 1 == 1 {
            result = Interval {
                lower: mul_down(result.lower, factor.lower),
                upper: mul_up(result.upper, factor.upper),
            };
        }
        n >>= 1;
        if n > 0 {
            factor = Interval {
                lower: mul_down(factor.lower, factor.lower),
                upper: mul_up(factor.upper, factor.upper),
            };
        }
    }
    result
}

/// Does the interval (with a small relative slack) contain `offset + k * period` for some integer k?
///
/// Errs on the side of `true`: reporting a point that is not there only loosens a bound.
fn contains_periodic_point(interval: Interval, offset: f64, period: f64) -> bool {
    let magnitude = interval.lower.abs().max(interval.upper.abs()).max(1.0);
    let slack = 1e-12 * magnitude;
    let k = ((interval.lower - slack - offset) / period).ceil();
    let point = offset + k * period;
    point <= interval.upper + slack
}

impl Default for Interval {
    fn default() -> Self {
        Self::singleton(0.0)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Self::singleton(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}, {}]", self.lower, self.upper)
        }
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        Interval {
            lower: -self.upper,
            upper: -self.lower,
        }
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        Interval {
            lower: add_down(self.lower, rhs.lower),
            upper: add_up(self.upper, rhs.upper),
        }
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        Interval {
            lower: sub_down(self.lower, rhs.upper),
            upper: sub_up(self.upper, rhs.lower),
        }
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        let corners = [
            (self.lower, rhs.lower),
            (self.lower, rhs.upper),
            (self.upper, rhs.lower),
            (self.upper, rhs.upper),
        ];
        let lower = corners
            .iter()
            .map(|&(a, b)| mul_down(a, b))
            .fold(f64::INFINITY, f64::min);
        let upper = corners
            .iter()
            .map(|&(a, b)| mul_up(a, b))
            .fold(f64::NEG_INFINITY, f64::max);
        Interval { lower, upper }
    }
}

impl Div for Interval {
    type Output = Interval;

    /// Division; a divisor that contains zero yields the whole line
    fn div(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        if rhs.contains(0.0) {
            return Interval::whole();
        }
        let corners = [
            (self.lower, rhs.lower),
            (self.lower, rhs.upper),
            (self.upper, rhs.lower),
            (self.upper, rhs.upper),
        ];
        let lower = corners
            .iter()
            .map(|&(a, b)| div_down(a, b))
            .fold(f64::INFINITY, f64::min);
        let upper = corners
            .iter()
            .map(|&(a, b)| div_up(a, b))
            .fold(f64::NEG_INFINITY, f64::max);
        Interval { lower, upper }
    }
}

macro_rules! impl_scalar_operand {
    ($($trait:ident :: $method:ident),*) => {
        $(
            impl $trait<f64> for Interval {
                type Output = Interval;

                fn $method(self, rhs: f64) -> Interval {
                    $trait::$method(self, Interval::singleton(rhs))
                }
            }

            impl $trait<Interval> for f64 {
                type Output = Interval;

                fn $method(self, rhs: Interval) -> Interval {
                    $trait::$method(Interval::singleton(self), rhs)
                }
            }
        )*
    };
}

impl_scalar_operand!(Add::add, Sub::sub, Mul::mul, Div::div);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_encloses(interval: Interval, value: f64) {
        assert!(
            interval.contains(value),
            "{} does not contain {}",
            interval,
            value
        );
    }

    #[test]
    fn test_construction() {
        let interval = Interval::hull(3.0, 1.0);
        assert_eq!(interval.lower(), 1.0);
        assert_eq!(interval.upper(), 3.0);
        assert_eq!(interval.clamp(5.0), 3.0);
        assert!(Interval::empty().is_empty());
        assert!(Interval::singleton(2.0).is_singleton());
        assert_eq!(Interval::new(1.0, 3.0).width(), 2.0);
        assert_eq!(Interval::new(1.0, 3.0).median(), 2.0);
    }

    #[test]
    fn test_arithmetic_encloses_pointwise_results() {
        let a = Interval::new(0.1, 0.7);
        let b = Interval::new(-0.3, 0.2);
        for &x in &[0.1, 0.4, 0.7] {
            for &y in &[-0.3, 0.0, 0.2] {
                assert_encloses(a + b, x + y);
                assert_encloses(a - b, x - y);
                assert_encloses(a * b, x * y);
            }
        }
        let c = Interval::new(2.0, 5.0);
        assert_encloses(a / c, 0.1 / 5.0);
        assert_encloses(a / c, 0.7 / 2.0);
        assert_encloses(2.0 * a + 1.0, 2.4);
        assert_encloses(1.0 - a / 2.0, 0.8);
    }

    #[test]
    fn test_division_by_zero_straddle_is_whole() {
        let result = Interval::new(1.0, 2.0) / Interval::new(-1.0, 1.0);
        assert_eq!(result, Interval::whole());
    }

    #[test]
    fn test_sin_over_half_period() {
        let result = Interval::new(0.0, PI).sin();
        assert!(result.lower() <= 0.0 && result.lower() > -1e-10);
        assert_eq!(result.upper(), 1.0);
    }

    #[test]
    fn test_cos_full_period() {
        let result = Interval::new(-1.0, 10.0).cos();
        assert_eq!(result, Interval::new(-1.0, 1.0));
    }

    #[test]
    fn test_cos_without_extrema() {
        let result = Interval::new(0.5, 1.0).cos();
        assert_encloses(result, 0.5f64.cos());
        assert_encloses(result, 1.0f64.cos());
        assert!(result.upper() < 0.9);
    }

    #[test]
    fn test_tan_pole() {
        assert_eq!(Interval::new(1.0, 2.0).tan(), Interval::whole());
        let result = Interval::new(-0.5, 0.5).tan();
        assert_encloses(result, 0.5f64.tan());
        assert_encloses(result, (-0.5f64).tan());
    }

    #[test]
    fn test_squared_and_powers() {
        let x = Interval::new(-1.0, 2.0);
        assert_eq!(x.squared().lower(), 0.0);
        assert_eq!(x.squared().upper(), 4.0);
        assert_eq!(x.powi(2), Interval::new(0.0, 4.0));
        assert_eq!(x.powi(3), Interval::new(-1.0, 8.0));
        let y = Interval::new(2.0, 4.0);
        assert_encloses(y.powi(-1), 0.25);
        assert_encloses(y.powi(-1), 0.5);
        assert_encloses(y.powf(Interval::singleton(0.5)), 2.0f64.sqrt());
    }

    #[test]
    fn test_sqrt_and_ln_domains() {
        assert!(Interval::new(-2.0, -1.0).sqrt().is_empty());
        assert_eq!(Interval::new(-1.0, 4.0).sqrt(), Interval::new(0.0, 2.0));
        assert!(Interval::new(-2.0, 0.0).ln().is_empty());
        assert_eq!(Interval::new(0.0, 1.0).ln().lower(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_inverse_trig_clamps() {
        let result = Interval::new(0.5, 3.0).asin();
        assert_encloses(result, 0.5f64.asin());
        assert_encloses(result, FRAC_PI_2);
        assert!(Interval::new(2.0, 3.0).acos().is_empty());
        let result = Interval::new(-1.0, 1.0).acos();
        assert_encloses(result, 0.0);
        assert_encloses(result, PI);
    }

    #[test]
    fn test_bisected_and_hull() {
        let (left, right) = Interval::new(0.0, 1.0).bisected();
        assert_eq!(left, Interval::new(0.0, 0.5));
        assert_eq!(right, Interval::new(0.5, 1.0));
        assert_eq!(left.hull_with(&right), Interval::new(0.0, 1.0));
        assert!(Interval::new(0.0, 1.0)
            .intersection(&Interval::new(2.0, 3.0))
            .is_empty());
    }
}
