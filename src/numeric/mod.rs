// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Numeric foundations: outward-rounded intervals and the scalar trait

pub mod interval;
pub mod rounding;
pub mod scalar;

pub use interval::Interval;
pub use scalar::EvalScalar;

/// Absolute tolerance below which a value is treated as zero
pub const ZERO_TOLERANCE: f64 = 1e-12;
