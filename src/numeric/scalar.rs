// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scalar abstraction shared by exact and interval evaluation
//!
//! The expression evaluator is written once against [`EvalScalar`]; the
//! `checked_*` methods return `None` where the input lies entirely outside
//! the function's domain, which the evaluator turns into a typed error.

use super::{Interval, ZERO_TOLERANCE};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Numeric type an expression can be evaluated over
pub trait EvalScalar:
    nalgebra::Scalar
    + Copy
    + Send
    + Sync
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Short name used in log output
    const KIND: &'static str;

    fn from_f64(value: f64) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }

    /// Within the zero tolerance (for intervals: entirely within it)
    fn is_zero(self) -> bool;

    /// At or below the zero tolerance (for intervals: the upper bound is)
    fn is_nonpositive(self) -> bool;

    /// `|x| >= 1` up to tolerance (for intervals: every point is)
    fn at_or_beyond_unit(self) -> bool;

    /// Representative value, used in error messages
    fn midpoint(self) -> f64;

    fn squared(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;
    fn powi(self, exponent: i32) -> Self;

    fn checked_sqrt(self) -> Option<Self>;
    fn checked_ln(self) -> Option<Self>;
    fn checked_asin(self) -> Option<Self>;
    fn checked_acos(self) -> Option<Self>;

    /// Real power for a non-negative base
    fn checked_powf(self, exponent: Self) -> Option<Self>;

    fn checked_div(self, divisor: Self) -> Option<Self> {
        if divisor.is_zero() {
            None
        } else {
            Some(self / divisor)
        }
    }
}

impl EvalScalar for f64 {
    const KIND: &'static str = "exact";

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    fn is_zero(self) -> bool {
        self.abs() <= ZERO_TOLERANCE
    }

    fn is_nonpositive(self) -> bool {
        self <= ZERO_TOLERANCE
    }

    fn at_or_beyond_unit(self) -> bool {
        self.abs() - 1.0 >= -ZERO_TOLERANCE
    }

    fn midpoint(self) -> f64 {
        self
    }

    fn squared(self) -> Self {
        self * self
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn powi(self, exponent: i32) -> Self {
        f64::powi(self, exponent)
    }

    fn checked_sqrt(self) -> Option<Self> {
        if self < -ZERO_TOLERANCE {
            None
        } else {
            Some(self.max(0.0).sqrt())
        }
    }

    fn checked_ln(self) -> Option<Self> {
        if self <= 0.0 {
            None
        } else {
            Some(self.ln())
        }
    }

    fn checked_asin(self) -> Option<Self> {
        if self.abs() - 1.0 > ZERO_TOLERANCE {
            None
        } else {
            Some(self.clamp(-1.0, 1.0).asin())
        }
    }

    fn checked_acos(self) -> Option<Self> {
        if self.abs() - 1.0 > ZERO_TOLERANCE {
            None
        } else {
            Some(self.clamp(-1.0, 1.0).acos())
        }
    }

    fn checked_powf(self, exponent: Self) -> Option<Self> {
        if self > 0.0 {
            Some(self.powf(exponent))
        } else if self.abs() <= ZERO_TOLERANCE && exponent > 0.0 {
            Some(0.0)
        } else {
            None
        }
    }
}

impl EvalScalar for Interval {
    const KIND: &'static str = "interval";

    #[inline]
    fn from_f64(value: f64) -> Self {
        Interval::singleton(value)
    }

    fn is_zero(self) -> bool {
        !self.is_empty() && self.lower() >= -ZERO_TOLERANCE && self.upper() <= ZERO_TOLERANCE
    }

    fn is_nonpositive(self) -> bool {
        self.upper() <= ZERO_TOLERANCE
    }

    fn at_or_beyond_unit(self) -> bool {
        self.abs().lower() - 1.0 >= -ZERO_TOLERANCE
    }

    fn midpoint(self) -> f64 {
        self.median()
    }

    fn squared(self) -> Self {
        Interval::squared(self)
    }

    fn sin(self) -> Self {
        Interval::sin(self)
    }

    fn cos(self) -> Self {
        Interval::cos(self)
    }

    fn tan(self) -> Self {
        Interval::tan(self)
    }

    fn exp(self) -> Self {
        Interval::exp(self)
    }

    fn powi(self, exponent: i32) -> Self {
        Interval::powi(self, exponent)
    }

    fn checked_sqrt(self) -> Option<Self> {
        if self.is_empty() || self.upper() < -ZERO_TOLERANCE {
            return None;
        }
        Some(Interval::new(self.lower().max(0.0), self.upper().max(0.0)).sqrt())
    }

    fn checked_ln(self) -> Option<Self> {
        let result = Interval::ln(self);
        (!result.is_empty()).then_some(result)
    }

    fn checked_asin(self) -> Option<Self> {
        unit_clamped(self).map(Interval::asin)
    }

    fn checked_acos(self) -> Option<Self> {
        unit_clamped(self).map(Interval::acos)
    }

    fn checked_powf(self, exponent: Self) -> Option<Self> {
        let result = Interval::powf(self, exponent);
        (!result.is_empty()).then_some(result)
    }
}

/// Clamps into `[-1, 1]` an interval that reaches it up to the zero tolerance,
/// matching the exact arcsine and arccosine domains
fn unit_clamped(value: Interval) -> Option<Interval> {
    let limit = 1.0 + ZERO_TOLERANCE;
    if value.is_empty() || value.lower() > limit || value.upper() < -limit {
        return None;
    }
    Some(Interval::new(value.lower().clamp(-1.0, 1.0), value.upper().clamp(-1.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_domains() {
        assert!(EvalScalar::checked_sqrt(-1.0f64).is_none());
        assert_eq!(EvalScalar::checked_sqrt(-1e-14f64), Some(0.0));
        assert!(EvalScalar::checked_asin(1.5f64).is_none());
        assert_eq!(EvalScalar::checked_acos(1.0 + 1e-13f64), Some(0.0));
        assert!(EvalScalar::checked_ln(0.0f64).is_none());
        assert!(EvalScalar::checked_powf(-2.0f64, 0.5).is_none());
        assert_eq!(EvalScalar::checked_powf(0.0f64, 2.0), Some(0.0));
        assert!(1.0f64.checked_div(0.0).is_none());
    }

    #[test]
    fn test_interval_predicates() {
        assert!(Interval::new(-1e-13, 1e-13).is_zero());
        assert!(!Interval::new(-1.0, 1.0).is_zero());
        assert!(Interval::new(-2.0, 0.0).is_nonpositive());
        assert!(!Interval::new(-2.0, 0.5).is_nonpositive());
        assert!(Interval::new(1.0, 2.0).at_or_beyond_unit());
        assert!(!Interval::new(0.5, 2.0).at_or_beyond_unit());
    }

    #[test]
    fn test_interval_domains() {
        assert!(Interval::new(2.0, 3.0).checked_asin().is_none());
        assert!(Interval::new(0.5, 3.0).checked_asin().is_some());
        assert!(Interval::new(-3.0, -2.0).checked_sqrt().is_none());
        let quotient = Interval::singleton(1.0).checked_div(Interval::new(-1.0, 1.0));
        assert_eq!(quotient, Some(Interval::whole()));
    }

    #[test]
    fn test_interval_domains_share_exact_tolerance() {
        for &x in &[-1e-13, -ZERO_TOLERANCE] {
            assert_eq!(EvalScalar::checked_sqrt(x), Some(0.0));
            let bounds = Interval::singleton(x).checked_sqrt().unwrap();
            assert!(bounds.contains(0.0));
        }
        assert!(Interval::singleton(-2e-12).checked_sqrt().is_none());

        let above = 1.0 + 1e-13;
        let exact = EvalScalar::checked_asin(above).unwrap();
        assert!(Interval::singleton(above).checked_asin().unwrap().contains(exact));
        let exact = EvalScalar::checked_acos(-above).unwrap();
        assert!(Interval::singleton(-above).checked_acos().unwrap().contains(exact));
        assert!(Interval::new(1.0 + 1e-11, 2.0).checked_asin().is_none());
    }
}
