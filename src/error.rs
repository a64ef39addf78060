// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Public error type

use crate::expression::EvaluationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("parameter index {index} out of range for {num_parameters} parameter(s)")]
    ParameterIndexOutOfRange { index: usize, num_parameters: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for recoverable domain problems (as opposed to caller mistakes)
    pub fn is_domain_error(&self) -> bool {
        matches!(self, Error::Evaluation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
