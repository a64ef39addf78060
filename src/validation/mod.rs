// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Consistency harness
//!
//! Cross-checks the evaluation paths of an expression against each other:
//! symbolic derivatives against central differences, Jacobians against
//! derivatives, interval bounds against sampled values, composition with the
//! identity, and deduplication.

pub mod checks;
pub mod config;
pub mod coordinator;
pub mod reporter;
pub mod types;

pub use checks::{
    check_composition_identity, check_deduplication, check_derivatives, check_interval_soundness,
    check_jacobian, sample_box, sample_point,
};
pub use config::{ValidationConfig, CONFIG_FILE};
pub use coordinator::{Check, ValidationCoordinator};
pub use reporter::ValidationReporter;
pub use types::{CheckOutcome, ExpressionReport, Report, MAX_RECORDED_FAILURES};
