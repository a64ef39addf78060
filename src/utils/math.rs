// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::SVector;

/// Linear interpolation
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Absolute error below one, relative error above
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    (actual - expected).abs() / expected.abs().max(1.0)
}

/// Largest componentwise `relative_error`
pub fn max_relative_error<const N: usize>(actual: &SVector<f64, N>, expected: &SVector<f64, N>) -> f64 {
    actual
        .iter()
        .zip(expected.iter())
        .map(|(&a, &e)| relative_error(a, e))
        .fold(0.0, f64::max)
}

/// Central-difference estimate from values at `x - step` and `x + step`
pub fn central_difference<const N: usize>(
    backward: &SVector<f64, N>,
    forward: &SVector<f64, N>,
    step: f64,
) -> SVector<f64, N> {
    (forward - backward) / (2.0 * step)
}
