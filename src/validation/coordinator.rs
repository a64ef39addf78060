// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Validation coordinator - runs every check over an expression

use colored::Colorize;
use nalgebra::SVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

use super::checks::{
    check_composition_identity, check_deduplication, check_derivatives, check_interval_soundness,
    check_jacobian,
};
use super::config::ValidationConfig;
use super::types::{CheckOutcome, ExpressionReport, Report};
use crate::numeric::Interval;
use crate::parametric::ParametricExpression;

/// Individual consistency checks, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Derivatives,
    Jacobian,
    IntervalSoundness,
    CompositionIdentity,
    Deduplication,
}

impl Check {
    pub const ALL: [Check; 5] = [
        Check::Derivatives,
        Check::Jacobian,
        Check::IntervalSoundness,
        Check::CompositionIdentity,
        Check::Deduplication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Derivatives => "derivatives",
            Check::Jacobian => "jacobian",
            Check::IntervalSoundness => "interval soundness",
            Check::CompositionIdentity => "composition identity",
            Check::Deduplication => "deduplication",
        }
    }
}

/// Validation coordinator
pub struct ValidationCoordinator {
    config: ValidationConfig,
    rng: StdRng,
    report: Report,
}

impl ValidationCoordinator {
    /// Create a new coordinator; the RNG is seeded from the config when a seed is set
    pub fn new(config: ValidationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let report = Report::new(config.seed);
        Self { config, rng, report }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run all checks over `expression` on the parameter box `domain`
    pub fn check_expression<const D: usize, const P: usize>(
        &mut self,
        name: &str,
        expression: &ParametricExpression<D, P>,
        domain: &SVector<Interval, P>,
    ) -> &ExpressionReport {
        let start = Instant::now();
        tracing::info!(expression = name, dimensions = D, parameters = P, "checking expression");
        if self.config.verbose {
            println!("{} {}", "Checking".bold().cyan(), name.bold());
        }

        let mut outcomes = Vec::new();
        for check in Check::ALL {
            let outcome = self.run_check(check, expression, domain);
            if self.config.verbose {
                Self::print_progress(&outcome);
            }
            let failed = !outcome.passed;
            outcomes.push(outcome);
            if failed && self.config.fail_fast {
                tracing::warn!(expression = name, check = check.as_str(), "stopping after first failure");
                break;
            }
        }

        self.report.add_expression_report(ExpressionReport {
            expression: name.to_string(),
            num_dimensions: D,
            num_parameters: P,
            node_count: expression.node().node_count(),
            outcomes,
            duration: start.elapsed(),
        });
        &self.report.expressions[self.report.expressions.len() - 1]
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    fn run_check<const D: usize, const P: usize>(
        &mut self,
        check: Check,
        expression: &ParametricExpression<D, P>,
        domain: &SVector<Interval, P>,
    ) -> CheckOutcome {
        let config = &self.config;
        let rng = &mut self.rng;
        match check {
            Check::Derivatives => check_derivatives(expression, domain, config, rng),
            Check::Jacobian => check_jacobian(expression, domain, config, rng),
            Check::IntervalSoundness => check_interval_soundness(expression, domain, config, rng),
            Check::CompositionIdentity => check_composition_identity(expression, domain, config, rng),
            Check::Deduplication => check_deduplication(expression, domain, config, rng),
        }
    }

    fn print_progress(outcome: &CheckOutcome) {
        let status = if outcome.passed { "ok".green() } else { "FAILED".red().bold() };
        println!(
            "  {:<22} {} {}",
            outcome.name,
            status,
            format!("({} samples, {} skipped)", outcome.samples, outcome.skipped).bright_black()
        );
    }
}
