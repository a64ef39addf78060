// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Consistency harness configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up by `ValidationConfig::load`
pub const CONFIG_FILE: &str = "expr-check.toml";

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Sample points per check
    pub samples: usize,
    /// Central-difference step
    pub step: f64,
    /// Relative tolerance between symbolic and numeric derivatives
    pub derivative_tolerance: f64,
    /// Relative tolerance between Jacobian columns and evaluated derivatives
    pub jacobian_tolerance: f64,
    /// Sub-boxes tried by the interval soundness check
    pub interval_subdivisions: usize,
    /// RNG seed; random when unset
    pub seed: Option<u64>,
    /// Worker threads for batch evaluation
    pub parallelism: Option<usize>,
    /// Stop checking an expression after its first failed check
    pub fail_fast: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            samples: 32,
            step: 1e-6,
            derivative_tolerance: 1e-5,
            jacobian_tolerance: 1e-9,
            interval_subdivisions: 8,
            seed: None,
            parallelism: None, // Auto-detect
            fail_fast: false,
            verbose: false,
        }
    }
}

impl ValidationConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;
        let config: ValidationConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config file {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `POLYFRAME_EXPR_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(samples) = lookup("POLYFRAME_EXPR_SAMPLES") {
            self.samples = samples
                .parse()
                .map_err(|_| Error::Config(format!("POLYFRAME_EXPR_SAMPLES is not a count: {}", samples)))?;
        }

        if let Some(seed) = lookup("POLYFRAME_EXPR_SEED") {
            self.seed = Some(
                seed.parse()
                    .map_err(|_| Error::Config(format!("POLYFRAME_EXPR_SEED is not an integer: {}", seed)))?,
            );
        }

        if let Some(verbose) = lookup("POLYFRAME_EXPR_VERBOSE") {
            self.verbose = verbose.parse().unwrap_or(false);
        }

        self.validate()
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("failed to write config file {:?}: {}", path, e)))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(Error::Config("samples must be positive".to_string()));
        }
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(Error::Config(format!("step must be positive, got {}", self.step)));
        }
        if self.derivative_tolerance <= 0.0 || self.jacobian_tolerance <= 0.0 {
            return Err(Error::Config("tolerances must be positive".to_string()));
        }
        if self.parallelism == Some(0) {
            return Err(Error::Config("parallelism must be positive when set".to_string()));
        }
        Ok(())
    }
}
