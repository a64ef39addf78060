// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Check outcome and report types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Failure messages kept per check; further failures are only counted
pub const MAX_RECORDED_FAILURES: usize = 8;

// Custom serialization for Duration
fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(secs))
}

/// Result of one consistency check on one expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    /// Comparisons performed
    pub samples: usize,
    /// Sample points skipped because the expression is undefined there
    pub skipped: usize,
    /// Largest error observed, relative to each check's own scale
    pub max_error: f64,
    pub failure_count: usize,
    pub failures: Vec<String>,
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub duration: Duration,
}

impl CheckOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            samples: 0,
            skipped: 0,
            max_error: 0.0,
            failure_count: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Record one comparison; fails the check when `error` exceeds `tolerance`
    pub fn record(&mut self, error: f64, tolerance: f64, describe: impl FnOnce() -> String) {
        self.samples += 1;
        if error.is_nan() || error > tolerance {
            self.fail(describe());
        }
        if error > self.max_error || error.is_nan() {
            self.max_error = error;
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn fail(&mut self, message: String) {
        self.passed = false;
        self.failure_count += 1;
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(message);
        }
    }
}

/// All check outcomes for one expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionReport {
    pub expression: String,
    pub num_dimensions: usize,
    pub num_parameters: usize,
    pub node_count: usize,
    pub outcomes: Vec<CheckOutcome>,
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub duration: Duration,
}

impl ExpressionReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }
}

/// Complete harness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub seed: Option<u64>,
    pub total_expressions: usize,
    pub total_checks: usize,
    pub total_passed: usize,
    pub total_failed: usize,
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub total_duration: Duration,
    pub expressions: Vec<ExpressionReport>,
}

impl Report {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed,
            total_expressions: 0,
            total_checks: 0,
            total_passed: 0,
            total_failed: 0,
            total_duration: Duration::ZERO,
            expressions: Vec::new(),
        }
    }

    pub fn add_expression_report(&mut self, report: ExpressionReport) {
        let passed = report.outcomes.iter().filter(|outcome| outcome.passed).count();
        self.total_expressions += 1;
        self.total_checks += report.outcomes.len();
        self.total_passed += passed;
        self.total_failed += report.outcomes.len() - passed;
        self.total_duration += report.duration;
        self.expressions.push(report);
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            (self.total_passed as f64 / self.total_checks as f64) * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new(None)
    }
}
