// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Directed rounding helpers built on error-free transformations
//!
//! The hardware only rounds to nearest, so every directed operation computes the
//! nearest result together with its exact residual (two-sum / fused multiply-add)
//! and steps one ulp outward only when the residual says the rounded value lies
//! on the wrong side of the true result.

/// Next representable value towards +infinity
#[inline]
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Next representable value towards -infinity
#[inline]
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

/// Step `count` ulps towards -infinity (used to widen libm results)
#[inline]
pub fn ulps_down(x: f64, count: u32) -> f64 {
    (0..count).fold(x, |value, _| next_down(value))
}

/// Step `count` ulps towards +infinity
#[inline]
pub fn ulps_up(x: f64, count: u32) -> f64 {
    (0..count).fold(x, |value, _| next_up(value))
}

/// Round a nearest-rounded result down given the sign of its residual
/// (`residual = exact - rounded`)
#[inline]
fn settle_down(rounded: f64, residual: f64) -> f64 {
    if rounded == f64::INFINITY {
        // Overflow: the exact value is finite, so the largest finite value bounds it
        return f64::MAX;
    }
    if !rounded.is_finite() || residual.is_nan() {
        return rounded;
    }
    if residual < 0.0 {
        next_down(rounded)
    } else {
        rounded
    }
}

#[inline]
fn settle_up(rounded: f64, residual: f64) -> f64 {
    if rounded == f64::NEG_INFINITY {
        return f64::MIN;
    }
    if !rounded.is_finite() || residual.is_nan() {
        return rounded;
    }
    if residual > 0.0 {
        next_up(rounded)
    } else {
        rounded
    }
}

/// Knuth's two-sum residual
#[inline]
fn sum_residual(a: f64, b: f64, sum: f64) -> f64 {
    let b_virtual = sum - a;
    let a_virtual = sum - b_virtual;
    (a - a_virtual) + (b - b_virtual)
}

#[inline]
pub fn add_down(a: f64, b: f64) -> f64 {
    if a.is_infinite() || b.is_infinite() {
        return a + b;
    }
    let sum = a + b;
    settle_down(sum, sum_residual(a, b, sum))
}

#[inline]
pub fn add_up(a: f64, b: f64) -> f64 {
    if a.is_infinite() || b.is_infinite() {
        return a + b;
    }
    let sum = a + b;
    settle_up(sum, sum_residual(a, b, sum))
}

#[inline]
pub fn sub_down(a: f64, b: f64) -> f64 {
    add_down(a, -b)
}

#[inline]
pub fn sub_up(a: f64, b: f64) -> f64 {
    add_up(a, -b)
}

/// Product rounded down; `0 * inf` is taken as zero, the interval-arithmetic convention
#[inline]
pub fn mul_down(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    if a.is_infinite() || b.is_infinite() {
        return a * b;
    }
    let product = a * b;
    settle_down(product, a.mul_add(b, -product))
}

#[inline]
pub fn mul_up(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    if a.is_infinite() || b.is_infinite() {
        return a * b;
    }
    let product = a * b;
    settle_up(product, a.mul_add(b, -product))
}

/// Sign of `a / b - q` as a residual, from the exact remainder `a - q * b`
#[inline]
fn quotient_residual(a: f64, b: f64, quotient: f64) -> f64 {
    let remainder = -quotient.mul_add(b, -a);
    if b < 0.0 {
        -remainder
    } else {
        remainder
    }
}

#[inline]
pub fn div_down(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return 0.0;
    }
    if a.is_infinite() || b.is_infinite() {
        return a / b;
    }
    let quotient = a / b;
    settle_down(quotient, quotient_residual(a, b, quotient))
}

#[inline]
pub fn div_up(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return 0.0;
    }
    if a.is_infinite() || b.is_infinite() {
        return a / b;
    }
    let quotient = a / b;
    settle_up(quotient, quotient_residual(a, b, quotient))
}

/// Square root rounded down (IEEE sqrt is correctly rounded, so one residual check suffices)
#[inline]
pub fn sqrt_down(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return x;
    }
    let root = x.sqrt();
    settle_down(root, (-root).mul_add(root, x))
}

#[inline]
pub fn sqrt_up(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return x;
    }
    let root = x.sqrt();
    settle_up(root, (-root).mul_add(root, x))
}
