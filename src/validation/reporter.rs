// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Harness report output

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use super::types::{CheckOutcome, Report};

/// Validation reporter
pub struct ValidationReporter;

impl ValidationReporter {
    /// Write JSON report
    pub fn write_json(report: &Report, path: impl AsRef<Path>) -> Result<()> {
        let json = report.to_json().context("Failed to serialize report")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write report: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Print summary to console
    pub fn print_summary(report: &Report) {
        Self::print_summary_with_verbose(report, false);
    }

    /// Print summary, with per-check failure details when `verbose`
    pub fn print_summary_with_verbose(report: &Report, verbose: bool) {
        println!("\n{}", "═".repeat(80).white());
        println!("{}", "Expression Consistency Report".bold());
        println!("{}", "═".repeat(80).white());
        println!("  {} {}", "Timestamp:".white(), report.timestamp.cyan());
        if let Some(seed) = report.seed {
            println!("  {} {}", "Seed:".white(), seed.to_string().cyan());
        }
        println!("  {} {}", "Expressions:".white(), report.total_expressions.to_string().cyan());
        println!(
            "  {} {} ({:.1}%)",
            "Checks passed:".white(),
            format!("{}/{}", report.total_passed, report.total_checks).green(),
            report.pass_rate()
        );
        if report.total_failed > 0 {
            println!("  {} {}", "Checks failed:".white(), report.total_failed.to_string().red().bold());
        }
        println!(
            "  {} {:.3}s",
            "Duration:".white(),
            report.total_duration.as_secs_f64()
        );

        println!("\n{}", "Expressions".bold());
        println!("{}", "─".repeat(80).white());
        for expression in &report.expressions {
            let status = if expression.passed() { "✅".green() } else { "❌".red() };
            println!(
                "  {} {:<16} R{} -> R{}  {:>4} nodes  {:.3}s",
                status,
                expression.expression.bold(),
                expression.num_parameters,
                expression.num_dimensions,
                expression.node_count,
                expression.duration.as_secs_f64()
            );
            for outcome in &expression.outcomes {
                Self::print_outcome(outcome);
            }
        }

        let failed: Vec<_> = report
            .expressions
            .iter()
            .flat_map(|expression| expression.failed_checks().map(move |outcome| (expression, outcome)))
            .collect();
        if !failed.is_empty() {
            println!("\n{}", "Failed Checks".red().bold());
            println!("{}", "─".repeat(80).white());
            for (expression, outcome) in failed {
                println!(
                    "\n  {} {} / {} ({} failures)",
                    "❌".red(),
                    expression.expression.bold(),
                    outcome.name,
                    outcome.failure_count
                );
                let shown = if verbose { outcome.failures.len() } else { outcome.failures.len().min(2) };
                for failure in outcome.failures.iter().take(shown) {
                    println!("     {}", failure.white());
                }
                if shown < outcome.failure_count {
                    println!("     {}", format!("... {} more", outcome.failure_count - shown).bright_black());
                }
            }
        }
        println!("{}", "═".repeat(80).white());
    }

    fn print_outcome(outcome: &CheckOutcome) {
        let status = if outcome.passed { "pass".green() } else { "fail".red().bold() };
        println!(
            "      {:<22} {}  {} {:.2e}  {}",
            outcome.name,
            status,
            "max error".bright_black(),
            outcome.max_error,
            format!("{} samples, {} skipped", outcome.samples, outcome.skipped).bright_black()
        );
    }
}
